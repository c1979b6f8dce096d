// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token record, one per athlete.

use serde::{Deserialize, Serialize};

/// Per-athlete OAuth token pair, stored keyed by athlete ID and
/// overwritten on every refresh (last writer wins).
///
/// No expiry timestamp is stored; validity is discovered reactively by
/// probing the Strava API and refreshing on 401.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub athlete_id: u64,
    pub access_token: String,
    pub refresh_token: String,
}
