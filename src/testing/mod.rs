//! Headless testing support: mock collaborators, an outline renderer, a few
//! fixture components and the [`Pilot`] driver.

pub mod fixtures;
pub mod outline;
pub mod pilot;
pub mod request;

pub use outline::OutlineRenderer;
pub use pilot::{Exchange, Pilot};
pub use request::{MockEnvironment, MockRequest};
