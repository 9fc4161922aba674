use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// What an orderable child is. Sections are the children of a course scope;
/// lectures and quizzes are the children of a section scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Section,
    Lecture,
    Quiz,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Section => "Section",
            ItemKind::Lecture => "Lecture",
            ItemKind::Quiz => "Quiz",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScopeId
// ---------------------------------------------------------------------------

/// A parent context whose children carry a meaningful order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeId {
    /// The section list of a course.
    Course { course_id: String },
    /// The lectures and quizzes of one section.
    Section {
        course_id: String,
        section_id: String,
    },
}

impl ScopeId {
    pub fn course(course_id: impl Into<String>) -> Self {
        ScopeId::Course {
            course_id: course_id.into(),
        }
    }

    pub fn section(course_id: impl Into<String>, section_id: impl Into<String>) -> Self {
        ScopeId::Section {
            course_id: course_id.into(),
            section_id: section_id.into(),
        }
    }

    pub fn course_id(&self) -> &str {
        match self {
            ScopeId::Course { course_id } | ScopeId::Section { course_id, .. } => course_id,
        }
    }

    /// The kind of child this scope orders.
    pub fn child_kinds(&self) -> &'static [ItemKind] {
        match self {
            ScopeId::Course { .. } => &[ItemKind::Section],
            ScopeId::Section { .. } => &[ItemKind::Lecture, ItemKind::Quiz],
        }
    }

    /// The identifier sent as `scopeId` on the wire.
    pub fn wire_id(&self) -> &str {
        match self {
            ScopeId::Course { course_id } => course_id,
            ScopeId::Section { section_id, .. } => section_id,
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeId::Course { course_id } => write!(f, "course/{course_id}"),
            ScopeId::Section {
                course_id,
                section_id,
            } => write!(f, "course/{course_id}/section/{section_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderableItem / OrderedScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderableItem {
    pub id: String,
    /// 1-based position inside the owning scope.
    pub order: u32,
    pub kind: ItemKind,
}

impl OrderableItem {
    pub fn new(id: impl Into<String>, order: u32, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            order,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedScope {
    pub id: ScopeId,
    pub items: Vec<OrderableItem>,
}

impl OrderedScope {
    pub fn new(id: ScopeId, items: Vec<OrderableItem>) -> Self {
        Self { id, items }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes: ordering
// ---------------------------------------------------------------------------

/// One row of a full-replace ordering write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    #[serde(alias = "_id")]
    pub item_id: String,
    pub item_type: ItemKind,
    pub order: u32,
}

impl From<&OrderableItem> for OrderEntry {
    fn from(item: &OrderableItem) -> Self {
        Self {
            item_id: item.id.clone(),
            item_type: item.kind,
            order: item.order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOrderRequest {
    pub scope_id: String,
    pub items: Vec<OrderEntry>,
}

// ---------------------------------------------------------------------------
// Wire shapes: uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetRole {
    Primary,
    DerivedThumbnail,
}

impl AssetRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetRole::Primary => "primary",
            AssetRole::DerivedThumbnail => "derived-thumbnail",
        }
    }
}

impl fmt::Display for AssetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub scope_id: String,
    pub asset_role: AssetRole,
    pub file_name: String,
    pub content_type: String,
}

/// A pre-signed destination for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(rename = "objectKey", alias = "s3Key")]
    pub object_key: String,
    #[serde(rename = "publicURL")]
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAssetRequest {
    pub object_key: String,
}

/// The content pointer written to an item once all of its assets landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedContent {
    pub object_key: String,
    #[serde(rename = "publicURL")]
    pub public_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_thumbnail_key: Option<String>,
    #[serde(
        rename = "derivedThumbnailURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub derived_thumbnail_url: Option<String>,
    /// Seconds, for time-based media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemContentRequest {
    pub item_id: String,
    pub content: FinalizedContent,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
