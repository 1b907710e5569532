//! Action dispatcher
//!
//! A dispatch cycle picks a random client, evaluates the legality table
//! against it and executes one legal action. Client state is only touched
//! after the action's last exchange succeeded, so a failed or cancelled
//! action leaves the client exactly as it found it.

use crate::actions::{choose_action, Action, LegalityContext};
use crate::client::{Authorization, ClientRecord, IssuedCertificate};
use crate::csr::build_csr;
use crate::error::{LoadError, LoadResult};
use crate::protocol::{
    endpoint_label, AcmeRequest, AuthorizationResource, AuthorizationStatus, Identifier,
    Problem, AUTHORIZATION_POLL_LABEL, CHALLENGE_LABEL, HTTP01, NEW_AUTHORIZATION_PATH,
    NEW_CERTIFICATE_PATH, NEW_REGISTRATION_PATH, REVOKE_CERTIFICATE_PATH,
};
use crate::scheduler::{CycleOutcome, CycleRunner};
use crate::signing::KeyMaterial;
use crate::state::EngineState;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use volley_http::{HttpMethod, StatusCode, TargetResponse};

const CLIENT_LABEL_LEN: usize = 10;

/// Whether an executed action reached the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Exchanged,
    /// Dropped before any request was sent
    Skipped,
}

pub struct Dispatcher {
    state: Arc<EngineState>,
}

impl Dispatcher {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn legality_context(&self, client: Option<&ClientRecord>) -> LegalityContext {
        LegalityContext {
            registry_size: self.state.registry.size(),
            max_clients: self.state.registry.max_clients(),
            pending_registrations: self.state.registry.pending(),
            client: client.map(ClientRecord::snapshot),
        }
    }

    /// Run one dispatch cycle, abandoning it if `cancel` fires
    pub async fn dispatch_cycle(&self, cancel: &CancellationToken) -> CycleOutcome {
        let client = self.state.registry.random_pick();
        let ctx = self.legality_context(client.as_deref());
        let chosen = choose_action(&ctx, &mut rand::thread_rng());

        let Some(action) = chosen else {
            warn!(
                registry_size = ctx.registry_size,
                max_clients = ctx.max_clients,
                pending = ctx.pending_registrations,
                "No legal action for dispatch cycle"
            );
            return CycleOutcome::Idle;
        };

        let result = tokio::select! {
            result = self.execute(action, client) => result,
            _ = cancel.cancelled() => Err(LoadError::Cancelled),
        };

        match result {
            Ok(Execution::Exchanged) => {
                debug!(%action, "Dispatch cycle completed");
                CycleOutcome::Completed(action)
            }
            Ok(Execution::Skipped) => CycleOutcome::Idle,
            Err(LoadError::Cancelled) => {
                debug!(%action, "Dispatch cycle cancelled");
                CycleOutcome::Failed(action)
            }
            Err(e) => {
                warn!(%action, kind = e.kind(), error = %e, "Dispatch cycle failed");
                CycleOutcome::Failed(action)
            }
        }
    }

    /// Execute `action`, acting as `client` where the action needs one
    pub async fn execute(
        &self,
        action: Action,
        client: Option<Arc<ClientRecord>>,
    ) -> LoadResult<Execution> {
        match (action, client) {
            (Action::NewRegistration, _) => return self.new_registration().await,
            (Action::NewAuthorization, Some(client)) => self.new_authorization(&client).await?,
            (Action::NewCertificate, Some(client)) => self.new_certificate(&client).await?,
            (Action::RevokeCertificate, Some(client)) => self.revoke_certificate(&client).await?,
            (action, None) => {
                return Err(LoadError::Protocol(format!(
                    "{action} needs an existing client"
                )))
            }
        }
        Ok(Execution::Exchanged)
    }

    async fn new_registration(&self) -> LoadResult<Execution> {
        // The slot is given back on any early return
        let Some(slot) = self.state.registry.reserve() else {
            debug!("Client registry full, skipping registration");
            return Ok(Execution::Skipped);
        };

        let key = KeyMaterial::generate(self.state.load.key_bits)?;
        let label = client_label();
        let request = AcmeRequest::NewRegistration {
            contact: vec![format!("mailto:{}@{}", label, self.state.load.domain_base)],
        };

        let response = self
            .post_signed(
                &key,
                &self.state.endpoint(NEW_REGISTRATION_PATH),
                &endpoint_label(HttpMethod::Post, NEW_REGISTRATION_PATH),
                &request,
            )
            .await?;
        expect_status(&response, StatusCode::CREATED)?;
        let registration_url = required_location(&response, "registration")?;

        info!(client = %label, registration = %registration_url, "Registered client");
        slot.fill(Arc::new(ClientRecord::new(key, registration_url, label)));
        Ok(Execution::Exchanged)
    }

    async fn new_authorization(&self, client: &ClientRecord) -> LoadResult<()> {
        let domain = client.next_domain(&self.state.load.domain_base);
        let request = AcmeRequest::NewAuthorization {
            identifier: Identifier::dns(domain.as_str()),
        };

        let response = self
            .post_signed(
                client.key(),
                &self.state.endpoint(NEW_AUTHORIZATION_PATH),
                &endpoint_label(HttpMethod::Post, NEW_AUTHORIZATION_PATH),
                &request,
            )
            .await?;
        expect_status(&response, StatusCode::CREATED)?;
        let authorization_url = required_location(&response, "authorization")?;
        let resource: AuthorizationResource = response.json()?;
        let challenge = resource.http01_challenge().ok_or_else(|| {
            LoadError::Protocol(format!("authorization for {domain} offers no {HTTP01} challenge"))
        })?;

        let key_authorization = client.key().key_authorization(&challenge.token);
        // Must be answerable before the target is told to validate
        let _token = self
            .state
            .challenges
            .register_scoped(&challenge.token, key_authorization.clone());

        let answer = AcmeRequest::ChallengeAnswer {
            kind: HTTP01.to_string(),
            key_authorization,
        };
        let response = self
            .post_signed(client.key(), &challenge.uri, CHALLENGE_LABEL, &answer)
            .await?;
        if !response.is_success() {
            return Err(problem_error(&response));
        }

        match self.poll_authorization(&authorization_url).await? {
            AuthorizationStatus::Valid => {
                debug!(client = %client.label(), %domain, "Authorization valid");
                client.add_authorization(Authorization {
                    url: authorization_url,
                    domain,
                });
                Ok(())
            }
            status => Err(LoadError::Protocol(format!(
                "authorization for {domain} ended as {status:?}"
            ))),
        }
    }

    async fn poll_authorization(&self, url: &str) -> LoadResult<AuthorizationStatus> {
        let polls = self.state.load.authorization_polls;
        for attempt in 1..=polls {
            let started = Instant::now();
            let response = self.state.client.get(url).await;
            self.state
                .latency
                .record(AUTHORIZATION_POLL_LABEL, started.elapsed());
            let response = response?;
            self.state.nonces.harvest(&response);

            if !response.is_success() {
                return Err(problem_error(&response));
            }
            let resource: AuthorizationResource = response.json()?;
            match resource.status {
                AuthorizationStatus::Valid
                | AuthorizationStatus::Invalid
                | AuthorizationStatus::Revoked => return Ok(resource.status),
                _ if attempt < polls => tokio::time::sleep(self.state.load.poll_interval).await,
                _ => {}
            }
        }
        Err(LoadError::Protocol(format!(
            "authorization {url} still pending after {polls} polls"
        )))
    }

    async fn new_certificate(&self, client: &ClientRecord) -> LoadResult<()> {
        let authorization = client
            .random_authorization()
            .ok_or_else(|| LoadError::Protocol("client holds no authorization".to_string()))?;
        let csr = build_csr(
            &self.state.certificate_key,
            std::slice::from_ref(&authorization.domain),
        )?;
        let request = AcmeRequest::NewCertificate {
            csr: URL_SAFE_NO_PAD.encode(csr),
        };

        let response = self
            .post_signed(
                client.key(),
                &self.state.endpoint(NEW_CERTIFICATE_PATH),
                &endpoint_label(HttpMethod::Post, NEW_CERTIFICATE_PATH),
                &request,
            )
            .await?;
        expect_status(&response, StatusCode::CREATED)?;
        let url = required_location(&response, "certificate")?;
        if response.body.is_empty() {
            return Err(LoadError::Protocol(format!(
                "certificate {url} returned an empty body"
            )));
        }

        debug!(client = %client.label(), certificate = %url, "Certificate issued");
        client.add_certificate(IssuedCertificate {
            url,
            der: response.body,
        });
        Ok(())
    }

    async fn revoke_certificate(&self, client: &ClientRecord) -> LoadResult<()> {
        let certificate = client
            .random_certificate()
            .ok_or_else(|| LoadError::Protocol("client holds no certificate".to_string()))?;
        let request = AcmeRequest::RevokeCertificate {
            certificate: URL_SAFE_NO_PAD.encode(&certificate.der),
        };

        let response = self
            .post_signed(
                client.key(),
                &self.state.endpoint(REVOKE_CERTIFICATE_PATH),
                &endpoint_label(HttpMethod::Post, REVOKE_CERTIFICATE_PATH),
                &request,
            )
            .await?;
        expect_status(&response, StatusCode::OK)?;

        debug!(client = %client.label(), certificate = %certificate.url, "Certificate revoked");
        Ok(())
    }

    /// Sign `request` with a fresh nonce and POST it, keeping any nonce the
    /// response carries
    async fn post_signed(
        &self,
        key: &KeyMaterial,
        url: &str,
        label: &str,
        request: &AcmeRequest,
    ) -> LoadResult<TargetResponse> {
        let nonce = self.state.nonces.get().await?;
        let payload = serde_json::to_vec(request)
            .map_err(|e| LoadError::Signing(format!("failed to serialise request: {e}")))?;
        let envelope = key.sign(&payload, &nonce)?;
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| LoadError::Signing(format!("failed to serialise envelope: {e}")))?;

        let started = Instant::now();
        let response = self.state.client.post_json(url, body).await;
        self.state.latency.record(label, started.elapsed());
        let response = response?;
        self.state.nonces.harvest(&response);
        Ok(response)
    }
}

#[async_trait]
impl CycleRunner for Dispatcher {
    async fn run_cycle(&self, cancel: CancellationToken) -> CycleOutcome {
        self.dispatch_cycle(&cancel).await
    }
}

fn client_label() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CLIENT_LABEL_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn expect_status(response: &TargetResponse, expected: StatusCode) -> LoadResult<()> {
    if response.status == expected {
        Ok(())
    } else {
        Err(problem_error(response))
    }
}

fn problem_error(response: &TargetResponse) -> LoadError {
    let detail = response.json::<Problem>().ok().and_then(|p| p.detail);
    match detail {
        Some(detail) => LoadError::Protocol(format!("status {}: {}", response.status, detail)),
        None => LoadError::Protocol(format!("unexpected status {}", response.status)),
    }
}

fn required_location(response: &TargetResponse, resource: &str) -> LoadResult<String> {
    response
        .location()
        .map(str::to_string)
        .ok_or_else(|| LoadError::Protocol(format!("{resource} response carries no Location header")))
}
