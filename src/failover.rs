//! Primary -> secondary fallback for generation requests

use std::collections::HashMap;
use std::sync::Arc;
use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{OrchestrationError, ProviderError};
use crate::providers::ProviderClient;
use crate::request::GenerationRequest;
use crate::ProviderRole;

/// Successful payload and who produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Orchestrated
{   pub payload: Value
  , pub role: ProviderRole
  , pub provider: crate::ProviderId
}

pub type OrchestrationResult = Result<Orchestrated, OrchestrationError>;

/// Per-request progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState
{   Init
  , PrimaryAttempted
  , SecondaryAttempted
  , Done(ProviderRole)
  , DualFailure
}

/// State machine for one request. Lives only as long as the request.
#[derive(Debug, Clone)]
pub struct FailoverSequence
{   pub state: AttemptState
  , pub has_secondary: bool
}

impl FailoverSequence
{   pub fn new(has_secondary: bool) -> Self
    {   FailoverSequence
        {   state: AttemptState::Init
          , has_secondary
        }
    }

    /// Primary is about to be called
    pub fn begin(&mut self) -> AttemptState
    {   if self.state == AttemptState::Init
        {   debug!("Failover state Init -> PrimaryAttempted");
            self.state = AttemptState::PrimaryAttempted;
        }
        self.state
    }

    /// Record an attempt outcome and move to the next state
    pub fn record(&mut self, succeeded: bool) -> AttemptState
    {   let next = match (self.state, succeeded)
        {   (AttemptState::PrimaryAttempted, true) => {
              AttemptState::Done(ProviderRole::Primary)
            }
          , (AttemptState::PrimaryAttempted, false) => {
              AttemptState::SecondaryAttempted
            }
          , (AttemptState::SecondaryAttempted, true) => {
              AttemptState::Done(ProviderRole::Secondary)
            }
          , (AttemptState::SecondaryAttempted, false) => {
              AttemptState::DualFailure
            }
          , (state, _) => state
        };
        debug!("Failover state {:?} -> {:?}", self.state, next);
        self.state = next;
        next
    }

    /// Check if we may try the secondary
    pub fn has_next(&self) -> bool
    {   self.has_secondary
          && self.state == AttemptState::PrimaryAttempted
    }
}

/// Run one request against `primary`, then against `secondary` only if
/// the primary attempt failed. Both attempts are classified the same
/// way; their errors are kept verbatim.
pub async fn with_fallback(
  primary: &dyn ProviderClient
, secondary: Option<&dyn ProviderClient>
, request: &GenerationRequest
) -> Result<Orchestrated, OrchestrationError>
{   let kind = request.kind();
    let mut sequence = FailoverSequence::new(secondary.is_some());
    sequence.begin();

    debug!("{:?}: calling primary {}", kind, primary.id());
    let primary_error = match crate::normalize::normalize(
      primary.call(request).await
    )
    {   Ok(payload) => {
          sequence.record(true);
          return Ok(Orchestrated
          {   payload
            , role: ProviderRole::Primary
            , provider: primary.id()
          });
        }
      , Err(e) => {
          warn!("{:?}: primary {} failed: {}", kind, primary.id(), e);
          e
        }
    };

    let secondary = match secondary
    {   Some(secondary) if sequence.has_next() => secondary
      , _ => {
          info!("{:?}: no secondary configured", kind);
          return Err(OrchestrationError::PrimaryOnly(primary_error));
        }
    };
    sequence.record(false);

    debug!("{:?}: falling back to {}", kind, secondary.id());
    match crate::normalize::normalize(secondary.call(request).await)
    {   Ok(payload) => {
          sequence.record(true);
          info!("{:?}: answered by secondary {}", kind, secondary.id());
          Ok(Orchestrated
          {   payload
            , role: ProviderRole::Secondary
            , provider: secondary.id()
          })
        }
      , Err(secondary_error) => {
          sequence.record(false);
          warn!(
            "{:?}: secondary {} failed too: {}",
            kind, secondary.id(), secondary_error
          );
          Err(OrchestrationError::DualFailure
          {   primary: primary_error
            , secondary: secondary_error
          })
        }
    }
}

/// Routes each operation to its configured providers
pub struct FallbackOrchestrator
{   providers: HashMap<crate::ProviderId, Arc<dyn ProviderClient>>
  , routing: crate::config::RoutingConfig
}

impl FallbackOrchestrator
{   pub fn new(routing: crate::config::RoutingConfig) -> Self
    {   FallbackOrchestrator
        {   providers: HashMap::new()
          , routing
        }
    }

    /// Register a client under its own id, replacing any previous one
    pub fn with_provider(mut self, client: Arc<dyn ProviderClient>) -> Self
    {   debug!("Registering provider {}", client.id());
        self.providers.insert(client.id(), client);
        self
    }

    /// Build both HTTP clients from configuration
    pub fn from_config(
      config: &crate::config::EduGenConfig
    ) -> Result<Self, crate::error::Error>
    {   config.validate()?;
        let mut orchestrator = FallbackOrchestrator::new(
          config.routing.clone()
        );
        for provider in &config.providers
        {   orchestrator = orchestrator.with_provider(
              crate::providers::from_config(provider, config.timeout_secs)?
            );
        }
        Ok(orchestrator)
    }

    pub fn routing(&self) -> &crate::config::RoutingConfig
    {   &self.routing
    }

    /// Run an already validated request
    pub async fn run(&self, request: &GenerationRequest) -> OrchestrationResult
    {   let route = self.routing.route(request.kind());

        let primary = match self.providers.get(&route.primary)
        {   Some(p) => p.clone()
          , None => {
              return Err(OrchestrationError::PrimaryOnly(
                unconfigured(route.primary)
              ));
            }
        };
        let secondary = route.secondary
          .and_then(|id| self.providers.get(&id).cloned());
        if route.secondary.is_some() && secondary.is_none()
        {   warn!("Secondary {:?} is not registered", route.secondary);
        }

        with_fallback(primary.as_ref(), secondary.as_deref(), request).await
    }
}

fn unconfigured(id: crate::ProviderId) -> ProviderError
{   ProviderError::transport(Some(serde_json::json!({
      "message": format!("provider {} is not configured", id),
    })))
}
