use reqwest::header::CONTENT_TYPE;

use super::{LoadedTrack, PlayerError, TrackLoader};

pub struct HttpTrackLoader {
    client: reqwest::Client,
}

impl HttpTrackLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTrackLoader {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl TrackLoader for HttpTrackLoader {
    async fn load(&self, url: &str) -> Result<LoadedTrack, PlayerError> {
        let res = self.client.get(url).send().await?.error_for_status()?;

        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Err(PlayerError::EmptyTrack);
        }

        Ok(LoadedTrack {
            source_url: url.to_string(),
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
