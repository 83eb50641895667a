use serde::{Deserialize, Serialize};

// Contact form submission
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactRequest {
    // Same checks the form enforces client side: every field required, email looks like one
    pub fn validate(&self) -> Result<(), &'static str> {
        let fields = [
            (&self.name, "name is required"),
            (&self.email, "email is required"),
            (&self.subject, "subject is required"),
            (&self.message, "message is required"),
        ];
        if let Some((_, missing)) = fields.iter().find(|(value, _)| value.trim().is_empty()) {
            return Err(*missing);
        }

        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err("email is invalid"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ContactResponse {
    pub message: String,
    pub remaining: u32,
}

// Body sent with a 429
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RateLimitedResponse {
    pub error: String,
    pub retry_after_ms: u64,
    pub remaining: u32,
}
