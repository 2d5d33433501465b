pub mod health;
pub mod init;
pub mod pins;
pub mod run;
pub mod version;

pub use health::Health;
pub use init::Init;
pub use pins::Pins;
pub use run::Run;
pub use version::Version;
