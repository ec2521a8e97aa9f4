//! Ambient (application default) credentials.
//!
//! Discovery order:
//! 1. `GOOGLE_APPLICATION_CREDENTIALS`
//! 2. the gcloud well-known ADC file
//! 3. the GCE metadata server
//!
//! Credential files may hold an `authorized_user` refresh token or a
//! `service_account` key. Service account keys are exchanged through the
//! JWT bearer grant.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AccessToken, TokenProvider};
use crate::error::{Error, Result};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const METADATA_PROBE_TIMEOUT: StdDuration = StdDuration::from_secs(2);
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default)]
        quota_project_id: Option<String>,
    },
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default)]
        private_key_id: Option<String>,
        #[serde(default)]
        token_uri: Option<String>,
        #[serde(default)]
        project_id: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Claims of the self-signed assertion sent to the token endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
enum Source {
    AuthorizedUser {
        path: PathBuf,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    ServiceAccount {
        path: PathBuf,
        client_email: String,
        key_id: Option<String>,
        key: EncodingKey,
    },
    Metadata {
        host: String,
    },
}

/// Token source backed by the ambient credential chain.
#[derive(Clone)]
pub struct ManagedTokenSource {
    http: reqwest::Client,
    source: Source,
    token_url: String,
}

impl std::fmt::Debug for ManagedTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedTokenSource")
            .field("source", &self.describe())
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl ManagedTokenSource {
    /// Walks the ambient chain. Fails when no usable credential exists.
    pub async fn discover() -> Result<Self> {
        if let Some(path) = env_credentials_path() {
            return Self::from_file(&path);
        }
        if let Some(path) = well_known_file().filter(|p| p.is_file()) {
            return Self::from_file(&path);
        }

        let host = metadata_host();
        if metadata_available(&host).await {
            return Ok(Self {
                http: reqwest::Client::new(),
                source: Source::Metadata { host },
                token_url: TOKEN_URL.to_string(),
            });
        }

        Err(Error::Auth(
            "could not find default credentials; run `gcloud auth application-default login` \
             or set GOOGLE_APPLICATION_CREDENTIALS"
                .to_string(),
        ))
    }

    /// Loads an ADC JSON file (`authorized_user` or `service_account`).
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = read_credentials_file(path)?;
        match file {
            CredentialsFile::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                ..
            } => Ok(Self {
                http: reqwest::Client::new(),
                source: Source::AuthorizedUser {
                    path: path.to_path_buf(),
                    client_id,
                    client_secret,
                    refresh_token,
                },
                token_url: TOKEN_URL.to_string(),
            }),
            CredentialsFile::ServiceAccount {
                client_email,
                private_key,
                private_key_id,
                token_uri,
                ..
            } => {
                let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
                    Error::Auth(format!("{}: invalid private key: {}", path.display(), e))
                })?;
                Ok(Self {
                    http: reqwest::Client::new(),
                    source: Source::ServiceAccount {
                        path: path.to_path_buf(),
                        client_email,
                        key_id: private_key_id,
                        key,
                    },
                    token_url: token_uri
                        .filter(|uri| !uri.is_empty())
                        .unwrap_or_else(|| TOKEN_URL.to_string()),
                })
            }
            CredentialsFile::Unsupported => Err(Error::Auth(format!(
                "{}: unsupported credentials type",
                path.display()
            ))),
        }
    }

    pub fn describe(&self) -> String {
        match &self.source {
            Source::AuthorizedUser { path, .. } => format!("authorized user ({})", path.display()),
            Source::ServiceAccount {
                path, client_email, ..
            } => format!("service account {} ({})", client_email, path.display()),
            Source::Metadata { host } => format!("metadata server ({})", host),
        }
    }

    async fn refresh_user_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {}", e)))?;
        parse_token_response(response).await
    }

    /// Signs an RS256 assertion with the key and trades it for a token.
    async fn service_account_token(
        &self,
        client_email: &str,
        key_id: Option<&str>,
        key: &EncodingKey,
    ) -> Result<TokenResponse> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: client_email.to_string(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.token_url.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = key_id.map(str::to_string);
        let assertion = jsonwebtoken::encode(&header, &claims, key)
            .map_err(|e| Error::Auth(format!("failed to sign assertion: {}", e)))?;

        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {}", e)))?;
        parse_token_response(response).await
    }

    async fn metadata_token(&self, host: &str) -> Result<TokenResponse> {
        let url = format!(
            "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
            host
        );
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Auth(format!("metadata token request failed: {}", e)))?;
        parse_token_response(response).await
    }
}

#[async_trait]
impl TokenProvider for ManagedTokenSource {
    async fn token(&self) -> Result<AccessToken> {
        let response = match &self.source {
            Source::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                ..
            } => {
                self.refresh_user_token(client_id, client_secret, refresh_token)
                    .await?
            }
            Source::ServiceAccount {
                client_email,
                key_id,
                key,
                ..
            } => {
                self.service_account_token(client_email, key_id.as_deref(), key)
                    .await?
            }
            Source::Metadata { host } => self.metadata_token(host).await?,
        };
        Ok(AccessToken::new(
            response.access_token,
            Utc::now() + Duration::seconds(response.expires_in),
        ))
    }
}

/// Project associated with the ambient credential, if any.
pub async fn ambient_project() -> Option<String> {
    let path = env_credentials_path().or_else(|| well_known_file().filter(|p| p.is_file()));
    if let Some(path) = path {
        return match read_credentials_file(&path) {
            Ok(CredentialsFile::AuthorizedUser {
                quota_project_id, ..
            }) => quota_project_id,
            Ok(CredentialsFile::ServiceAccount { project_id, .. }) => project_id,
            Ok(CredentialsFile::Unsupported) => None,
            Err(e) => {
                warn!("Ignoring credentials file: {}", e);
                None
            }
        };
    }

    let host = metadata_host();
    let client = reqwest::Client::builder()
        .timeout(METADATA_PROBE_TIMEOUT)
        .build()
        .ok()?;
    let response = client
        .get(format!("http://{}/computeMetadata/v1/project/project-id", host))
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let project = response.text().await.ok()?.trim().to_string();
    (!project.is_empty()).then_some(project)
}

async fn parse_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!(
            "token request failed with status {}: {}",
            status,
            body.trim()
        )));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("failed to parse token response: {}", e)))
}

fn read_credentials_file(path: &Path) -> Result<CredentialsFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Auth(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Auth(format!("failed to parse {}: {}", path.display(), e)))
}

fn env_credentials_path() -> Option<PathBuf> {
    std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn well_known_file() -> Option<PathBuf> {
    let dir = match std::env::var_os("CLOUDSDK_CONFIG").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()?.join("gcloud"),
    };
    Some(dir.join("application_default_credentials.json"))
}

fn metadata_host() -> String {
    std::env::var("GCE_METADATA_HOST")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string())
}

async fn metadata_available(host: &str) -> bool {
    let Ok(client) = reqwest::Client::builder()
        .timeout(METADATA_PROBE_TIMEOUT)
        .build()
    else {
        return false;
    };
    match client
        .get(format!("http://{}/computeMetadata/v1/", host))
        .header("Metadata-Flavor", "Google")
        .send()
        .await
    {
        Ok(response) => {
            let flavor = response
                .headers()
                .get("Metadata-Flavor")
                .and_then(|v| v.to_str().ok());
            flavor == Some("Google")
        }
        Err(e) => {
            debug!("Metadata server at {} unavailable: {}", host, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_authorized_user_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.user",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = write_file(
            r#"{"type":"authorized_user","client_id":"cid","client_secret":"cs","refresh_token":"rt-1","quota_project_id":"qp"}"#,
        );
        let mut source = ManagedTokenSource::from_file(file.path()).unwrap();
        source.token_url = format!("{}/token", server.uri());

        let token = source.token().await.unwrap();
        assert_eq!(token.secret(), "ya29.user");
        assert!(!token.expires_within(Duration::minutes(30)));
    }

    #[tokio::test]
    async fn test_refresh_rejected_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let file = write_file(
            r#"{"type":"authorized_user","client_id":"cid","client_secret":"cs","refresh_token":"rt"}"#,
        );
        let mut source = ManagedTokenSource::from_file(file.path()).unwrap();
        source.token_url = format!("{}/token", server.uri());

        match source.token().await {
            Err(Error::Auth(msg)) => assert!(msg.contains("invalid_grant")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    const SA_PRIVATE_KEY: &str = include_str!("../../testdata/service_account_key.pem");
    const SA_PUBLIC_KEY: &str = include_str!("../../testdata/service_account_key.pub.pem");

    fn service_account_file(token_uri: &str) -> tempfile::NamedTempFile {
        let key = serde_json::json!({
            "type": "service_account",
            "project_id": "p",
            "private_key_id": "key-1",
            "private_key": SA_PRIVATE_KEY,
            "client_email": "gemctl@p.iam.gserviceaccount.com",
            "client_id": "1234",
            "token_uri": token_uri
        });
        write_file(&key.to_string())
    }

    #[tokio::test]
    async fn test_service_account_jwt_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("jwt-bearer"))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.sa",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token_uri = format!("{}/token", server.uri());
        let file = service_account_file(&token_uri);
        let source = ManagedTokenSource::from_file(file.path()).unwrap();
        assert!(source.describe().contains("gemctl@p.iam.gserviceaccount.com"));

        let token = source.token().await.unwrap();
        assert_eq!(token.secret(), "ya29.sa");
        assert!(!token.expires_within(Duration::minutes(30)));

        // The assertion is a base64url JWT, so form encoding leaves it intact.
        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let assertion = body
            .split('&')
            .find_map(|pair| pair.strip_prefix("assertion="))
            .unwrap();

        let header = jsonwebtoken::decode_header(assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));

        let mut validation = jsonwebtoken::Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_uri.as_str()]);
        let decoded = jsonwebtoken::decode::<AssertionClaims>(
            assertion,
            &jsonwebtoken::DecodingKey::from_rsa_pem(SA_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims.iss, "gemctl@p.iam.gserviceaccount.com");
        assert_eq!(decoded.claims.scope, CLOUD_PLATFORM_SCOPE);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_service_account_default_token_uri() {
        let file = service_account_file("");
        let source = ManagedTokenSource::from_file(file.path()).unwrap();
        assert_eq!(source.token_url, TOKEN_URL);
    }

    #[test]
    fn test_service_account_bad_key_rejected() {
        let file = write_file(
            r#"{"type":"service_account","client_email":"a@b","private_key":"not a key"}"#,
        );
        match ManagedTokenSource::from_file(file.path()) {
            Err(Error::Auth(msg)) => assert!(msg.contains("invalid private key")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let file = write_file(r#"{"type":"external_account"}"#);
        assert!(matches!(
            ManagedTokenSource::from_file(file.path()),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(matches!(
            ManagedTokenSource::from_file(Path::new("/nonexistent/adc.json")),
            Err(Error::Auth(_))
        ));
    }
}
