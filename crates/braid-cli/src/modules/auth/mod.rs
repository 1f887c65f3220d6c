pub mod actions;
pub mod args;
pub mod http;
pub mod netrc;
pub mod prerun;

pub use http::{AuthClient, AuthTokens, ControlPlaneClient, HttpAuthClient, HttpControlPlaneClient, UserProfile};
pub use netrc::{CredentialRefresher, NetrcHandler, NetrcMachine, NetrcRefresher};
pub use prerun::{CommandRequirement, PreRun};
