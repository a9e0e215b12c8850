//! Seal placements and placement suggestions

use serde::{Deserialize, Serialize};

use crate::coords::Viewport;
use crate::document::MergedSummary;
use crate::page_info::PageInfo;
use crate::seal::SealId;

/// Distance kept between a suggested seal and the page edges
const SUGGESTION_MARGIN: f64 = 72.0;

/// A seal positioned in PDF space.
///
/// `x`/`y` are points from the lower-left MediaBox corner of `page`
/// (1-based) and locate the centre of the seal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealPlacement {
    pub seal_id: SealId,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub riding: bool,
}

/// A seal positioned by the viewer, before coordinate mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerPlacement {
    pub seal_id: SealId,
    pub page: u32,
    pub viewer_x: f64,
    pub viewer_y: f64,
    #[serde(default = "default_viewer_scale")]
    pub viewer_scale: f64,
    /// Canvas size at scale 1.0; defaults to the page size in points
    #[serde(default)]
    pub canvas_width: Option<f64>,
    #[serde(default)]
    pub canvas_height: Option<f64>,
    #[serde(default)]
    pub riding: bool,
}

fn default_viewer_scale() -> f64 {
    1.0
}

impl ViewerPlacement {
    /// Map onto a page of the given size
    pub fn to_placement(&self, page_width_pt: f64, page_height_pt: f64) -> SealPlacement {
        let viewport = Viewport {
            scale: self.viewer_scale,
            page_width_pt,
            page_height_pt,
            canvas_width_px: self.canvas_width.unwrap_or(0.0),
            canvas_height_px: self.canvas_height.unwrap_or(0.0),
        };
        let (x, y) = viewport.to_pdf(self.viewer_x, self.viewer_y);
        SealPlacement {
            seal_id: self.seal_id,
            page: self.page,
            x,
            y,
            riding: self.riding,
        }
    }
}

impl ViewerPlacement {
    /// Map onto `page` as the viewer shows it, honouring `/Rotate`
    pub fn to_page_placement(&self, page: &PageInfo) -> SealPlacement {
        let (shown_width, shown_height) = page.displayed_size();
        let shown = self.to_placement(shown_width, shown_height);
        let (x, y) = page.unrotate(shown.x, shown.y);
        SealPlacement { x, y, ..shown }
    }
}

/// Result of submitting viewer placements
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SubmitOutcome {
    Accepted { placements: Vec<SealPlacement> },
    Rejected { reason: String },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

/// Proposes placements for a freshly merged document
pub trait PlacementSuggester: Send + Sync {
    fn suggest(&self, merged: &MergedSummary, page_sizes: &[(f64, f64)]) -> Vec<SealPlacement>;
}

/// Suggests the conventional signature spot: bottom right of the primary
/// document's last page, plus a riding seal when attachments were merged
#[derive(Debug, Clone, Copy)]
pub struct SignatureCornerSuggester {
    pub seal_id: SealId,
}

impl SignatureCornerSuggester {
    pub fn new(seal_id: SealId) -> Self {
        Self { seal_id }
    }
}

impl PlacementSuggester for SignatureCornerSuggester {
    fn suggest(&self, merged: &MergedSummary, page_sizes: &[(f64, f64)]) -> Vec<SealPlacement> {
        let Some(last_primary) = merged
            .page_origins
            .iter()
            .rposition(|origin| origin.part == 0)
        else {
            return Vec::new();
        };
        let page = last_primary as u32 + 1;
        let (width, _) = page_sizes
            .get(last_primary)
            .copied()
            .unwrap_or((612.0, 792.0));

        let mut suggestions = vec![SealPlacement {
            seal_id: self.seal_id,
            page,
            x: (width - SUGGESTION_MARGIN).max(0.0),
            y: SUGGESTION_MARGIN,
            riding: false,
        }];

        if let Some(seam) = merged.seams().first() {
            let (seam_width, seam_height) = page_sizes
                .get(seam.left_page as usize - 1)
                .copied()
                .unwrap_or((612.0, 792.0));
            suggestions.push(SealPlacement {
                seal_id: self.seal_id,
                page: seam.left_page,
                x: (seam_width - SUGGESTION_MARGIN).max(0.0),
                y: seam_height / 2.0,
                riding: true,
            });
        }
        suggestions
    }
}
