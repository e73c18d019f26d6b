use thiserror::Error;

pub type Result<T> = std::result::Result<T, DevboardError>;

#[derive(Error, Debug)]
pub enum DevboardError {
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Commit find error: {0}")]
    CommitFind(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
    #[error("Object decode error: {0}")]
    Decode(#[from] Box<gix::objs::decode::Error>),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API error: {0}")]
    Api(String),
    #[error("Line counter error: {0}")]
    Counter(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::discover::Error> for DevboardError {
    fn from(err: gix::discover::Error) -> Self {
        DevboardError::GitDiscover(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for DevboardError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        DevboardError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for DevboardError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        DevboardError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for DevboardError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        DevboardError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for DevboardError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        DevboardError::CommitFind(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for DevboardError {
    fn from(err: gix::object::commit::Error) -> Self {
        DevboardError::Commit(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for DevboardError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        DevboardError::DiffTreeToTree(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for DevboardError {
    fn from(err: gix::objs::decode::Error) -> Self {
        DevboardError::Decode(Box::new(err))
    }
}
