pub mod download;
pub mod grant;
pub mod grants;
pub mod info;
pub mod init;
pub mod ls;
pub mod revoke;
pub mod upload;
pub mod version;

pub use download::Download;
pub use grant::Grant;
pub use grants::Grants;
pub use info::Info;
pub use init::Init;
pub use ls::Ls;
pub use revoke::Revoke;
pub use upload::Upload;
pub use version::Version;
