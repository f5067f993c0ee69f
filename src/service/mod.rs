pub mod diagnostics;
pub mod digest;
pub mod identity;
pub mod tasks;
pub mod validation;

pub use diagnostics::Diagnostics;
pub use digest::{PasswordDigest, RollingDigest};
pub use identity::IdentityRepository;
pub use tasks::TaskRepository;
