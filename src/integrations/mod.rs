//! External service integrations.

pub mod backend_client {
    pub use crate::backend_client::*;
}

pub mod view_query {
    pub use crate::view_query::*;
}

pub mod queries {
    pub use crate::queries::*;
}
