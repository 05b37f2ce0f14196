pub mod contact;
pub mod session;
pub mod upload;
pub mod user;

pub use contact::ContactMessage;
pub use session::SessionRecord;
pub use upload::UploadRecord;
pub use user::{User, UserRecord};
