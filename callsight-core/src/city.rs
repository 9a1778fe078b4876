//! City entity

use crate::CityId;
use serde::{Deserialize, Serialize};

/// A city calls are routed from. `state` groups cities on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct City {
    pub city_id: CityId,
    pub name: String,
    pub state: Option<String>,
}

/// City creation payload. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCity {
    pub name: String,
    pub state: Option<String>,
}

impl NewCity {
    pub fn new(name: impl Into<String>, state: Option<&str>) -> Self {
        Self {
            name: name.into(),
            state: state.map(str::to_string),
        }
    }
}
