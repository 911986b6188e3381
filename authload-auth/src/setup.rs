use authload_core::{Provisioned, Provisioner};

use crate::api::AuthApi;
use crate::config::{AuthConfig, SETUP_SCENARIO};
use crate::payload::{Credentials, SignupPayload};
use crate::request::EndpointKind;

const LOG_BODY_LIMIT: usize = 800;

/// Signs up one fresh account per call; accepted accounts become login credentials.
#[derive(Debug)]
pub struct SignupProvisioner {
    api: AuthApi,
    expect_code: String,
}

impl SignupProvisioner {
    pub fn new(cfg: &AuthConfig, api: AuthApi) -> Self {
        Self {
            api,
            expect_code: cfg.expect_signup_code.clone(),
        }
    }
}

impl Provisioner for SignupProvisioner {
    type Item = Credentials;

    async fn provision(&self, _index: u64) -> Provisioned<Credentials> {
        let payload = SignupPayload::random(&mut rand::thread_rng());
        let req = self.api.requests.signup(&payload);

        let outcome = self
            .api
            .call(SETUP_SCENARIO, EndpointKind::Signup, req)
            .await;
        if self.api.accepts(&outcome, &self.expect_code) {
            Provisioned::Accepted(payload.credentials())
        } else {
            Provisioned::Rejected(outcome.describe(LOG_BODY_LIMIT))
        }
    }
}
