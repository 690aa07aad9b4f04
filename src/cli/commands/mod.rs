pub mod doc;
pub mod grant;
pub mod init;
pub mod vendor;
