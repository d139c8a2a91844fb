// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::geo::BoundingBox;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Road classes worth labelling on a campus-scale map.
const ROAD_CLASSES: &str = "^(primary|secondary|tertiary|residential)$";

pub type Tags = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Overpass request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Overpass returned HTTP {status}")]
    Status { status: u16 },
    #[error("Overpass response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// An Overpass `[out:json]` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverpassResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        tags: Tags,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        tags: Tags,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<Member>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        tags: Tags,
    },
    /// Areas, counts and anything else Overpass may emit.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: MemberKind,
    #[serde(rename = "ref")]
    pub reference: i64,
    #[serde(default)]
    pub role: String,
}

/// Builds the Overpass QL query for buildings, building parts and named road
/// classes inside `bbox`, expanded down to their nodes.
pub fn build_query(bbox: &BoundingBox) -> String {
    let b = bbox.overpass_filter();
    format!(
        "[out:json][timeout:25];\n\
         (\n\
         way[\"building\"]{b};\n\
         relation[\"building\"]{b};\n\
         way[\"building:part\"]{b};\n\
         relation[\"building:part\"]{b};\n\
         way[\"highway\"~\"{ROAD_CLASSES}\"]{b};\n\
         );\n\
         (._;>;);\n\
         out;\n"
    )
}

/// Something that can answer an Overpass QL query.
pub trait OverpassSource {
    fn query(&self, ql: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>>;
}

/// Overpass interpreter reached over HTTP.
pub struct HttpOverpass {
    client: reqwest::Client,
    url: String,
}

impl HttpOverpass {
    pub fn new(url: &str, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl OverpassSource for HttpOverpass {
    async fn query(&self, ql: &str) -> Result<OverpassResponse, FetchError> {
        info!("Querying Overpass — url={} query_bytes={}", self.url, ql.len());

        let response = self
            .client
            .post(&self.url)
            .body(ql.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        // Overpass reports overload as an HTML page with a 200 status, so the
        // body is decoded by hand to surface that as a decode error.
        let bytes = response.bytes().await?;
        let doc: OverpassResponse = serde_json::from_slice(&bytes)?;

        debug!(
            "Overpass answered — bytes={} elements={}",
            bytes.len(),
            doc.elements.len()
        );
        Ok(doc)
    }
}
