//! Command executor port — issues service calls to actuators.

use std::future::Future;
use std::sync::Arc;

use climgroup_domain::context::CallContext;
use climgroup_domain::error::ClimGroupError;
use climgroup_domain::service::ServiceCall;

/// Executes climate service calls against the actuators they address.
pub trait CommandExecutor {
    /// Issue `call`, tagging every resulting state change with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::Command`] when an addressed actuator cannot
    /// execute the call.
    fn execute(
        &self,
        call: ServiceCall,
        context: &CallContext,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send;
}

impl<T: CommandExecutor + Send + Sync> CommandExecutor for Arc<T> {
    fn execute(
        &self,
        call: ServiceCall,
        context: &CallContext,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send {
        (**self).execute(call, context)
    }
}
