// Permission grants and their resolution over the vendor tree

pub mod grant;
pub mod resolver;

pub use grant::*;
pub use resolver::*;

/// Act on documents at the next verification level
pub const VERIFY_DOCUMENT: &str = "verify_document";
/// Upload documents owned by a vendor
pub const UPLOAD_DOCUMENT: &str = "upload_document";
/// Resubmit or archive any document in scope
pub const MANAGE_DOCUMENTS: &str = "manage_documents";
/// Insert, move, delete and change the status of vendors
pub const MANAGE_VENDORS: &str = "manage_vendors";
/// Create and revoke organizational grants
pub const MANAGE_PERMISSIONS: &str = "manage_permissions";

pub const PERMISSION_CODES: [&str; 5] = [
    VERIFY_DOCUMENT,
    UPLOAD_DOCUMENT,
    MANAGE_DOCUMENTS,
    MANAGE_VENDORS,
    MANAGE_PERMISSIONS,
];
