use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::Response;

use shopdesk_auth::{CommandAuthorization, Permission};

use crate::app::errors::{authz_error_to_response, validation_error};
use crate::authz::authorize_command;
use crate::context::PrincipalContext;

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, required: Permission) -> Self {
        Self {
            inner,
            required: vec![required],
        }
    }

    /// Authorize and unwrap the command, or produce the 403 response.
    pub fn authorized(self, principal: &PrincipalContext) -> Result<C, Response> {
        authorize_command(principal, &self).map_err(authz_error_to_response)?;
        Ok(self.inner)
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Unwrap a JSON body, reporting any rejection as a `ValidationError`.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| validation_error(rejection.body_text()))
}
