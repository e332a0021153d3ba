mod models;

pub use models::{
    CreateSessionResponse, PollResponse, RefreshRequest, CLIENT_ID_HEADER, CLIENT_SECRET_HEADER,
    PROXY_SECRET_HEADER, PROXY_SECRET_QUERY,
};
