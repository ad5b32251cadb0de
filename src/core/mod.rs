// Domain-layer modules and shared errors/models
pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}

pub mod session {
    pub use crate::session::*;
}

pub mod user_data {
    pub use crate::user_data::*;
}

pub mod view {
    pub use crate::view::*;
}
