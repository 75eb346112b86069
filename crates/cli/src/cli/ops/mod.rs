pub mod add;
pub mod cat;
pub mod dag;
pub mod get_json;
pub mod init;
pub mod pinned;
pub mod resolve;
pub mod rm;

pub use add::Add;
pub use cat::Cat;
pub use dag::Dag;
pub use get_json::GetJson;
pub use init::Init;
pub use pinned::Pinned;
pub use resolve::Resolve;
pub use rm::Rm;
