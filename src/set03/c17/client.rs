// A padding oracle on the other end of an HTTP connection.
//
// Network calls can fail for reasons that have nothing to do with the
// ciphertext, so every request gets a timeout and a bounded number of
// retries. Invalid padding is an ordinary answer and is never retried.
use crate::{OracleError, PaddingOracle};

use reqwest::{blocking::Client, StatusCode};
use tracing::warn;

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    pub timeout: Duration,
    /// Retries after the first attempt of each request.
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }
}

pub struct HttpPaddingOracle {
    base_url: String,
    client: Client,
    config: HttpOracleConfig,
}

impl HttpPaddingOracle {
    pub fn new(base_url: impl Into<String>, config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Unavailable {
                attempts: 0,
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            config,
        })
    }

    fn get(&self, path_and_query: &str) -> Result<(StatusCode, String), OracleError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let attempts = self.config.max_retries + 1;
        let mut reason = String::new();
        for attempt in 1..=attempts {
            match self.client.get(&url).send() {
                Ok(response) if response.status().is_server_error() => {
                    reason = format!("server responded {}", response.status());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .map_err(|e| OracleError::BadResponse(e.to_string()))?;
                    return Ok((status, body));
                }
                Err(e) => reason = e.to_string(),
            }
            warn!(attempt, %reason, "padding oracle request failed");
            if attempt < attempts {
                std::thread::sleep(self.config.retry_delay);
            }
        }
        Err(OracleError::Unavailable { attempts, reason })
    }
}

impl PaddingOracle for HttpPaddingOracle {
    fn encrypt(&self) -> Result<(Vec<u8>, Vec<u8>), OracleError> {
        let (status, body) = self.get("/encrypt")?;
        if status != StatusCode::OK {
            return Err(OracleError::BadResponse(format!("{status}: {body}")));
        }
        let (ciphertext, iv) = body.trim().split_once(':').ok_or_else(|| {
            OracleError::BadResponse(format!("expected 'ciphertext:iv', got '{body}'"))
        })?;
        let decode =
            |s: &str| hex::decode(s).map_err(|e| OracleError::BadResponse(e.to_string()));
        Ok((decode(ciphertext)?, decode(iv)?))
    }

    fn validate(&self, ciphertext: &[u8], iv: &[u8]) -> Result<bool, OracleError> {
        let query = format!(
            "/validate?ciphertext={}&iv={}",
            hex::encode(ciphertext),
            hex::encode(iv)
        );
        match self.get(&query)? {
            (StatusCode::OK, _) => Ok(true),
            (StatusCode::FORBIDDEN, _) => Ok(false),
            (status, body) => Err(OracleError::BadResponse(format!("{status}: {body}"))),
        }
    }
}
