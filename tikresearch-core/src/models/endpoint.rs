//! Research API endpoint catalogue.
//!
//! Each endpoint knows its path relative to the API base, the key its
//! records live under in the response `data` object, and the fields it
//! accepts in the `fields` query parameter.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Field Lists
// ============================================================================

const VIDEO_FIELDS: &[&str] = &[
    "id",
    "video_description",
    "create_time",
    "region_code",
    "share_count",
    "view_count",
    "like_count",
    "comment_count",
    "music_id",
    "hashtag_names",
    "username",
    "effect_ids",
    "playlist_id",
    "voice_to_text",
    "is_stem_verified",
    "favorites_count",
    "video_duration",
    "hashtag_info_list",
    "video_mention_list",
    "video_label",
    "video_tag",
];

const DEFAULT_VIDEO_FIELDS: &[&str] = &[
    "id",
    "video_description",
    "create_time",
    "region_code",
    "share_count",
    "view_count",
    "like_count",
    "comment_count",
    "music_id",
    "hashtag_names",
    "username",
    "effect_ids",
    "playlist_id",
    "voice_to_text",
];

const USER_INFO_FIELDS: &[&str] = &[
    "display_name",
    "bio_description",
    "avatar_url",
    "is_verified",
    "follower_count",
    "following_count",
    "likes_count",
    "video_count",
    "bio_url",
];

const DEFAULT_USER_INFO_FIELDS: &[&str] = &[
    "display_name",
    "bio_description",
    "avatar_url",
    "is_verified",
    "follower_count",
    "following_count",
    "likes_count",
    "video_count",
];

const USER_VIDEO_FIELDS: &[&str] = &[
    "id",
    "create_time",
    "username",
    "region_code",
    "video_description",
    "music_id",
    "like_count",
    "comment_count",
    "share_count",
    "view_count",
    "hashtag_names",
    "is_stem_verified",
    "favorites_count",
    "video_duration",
];

const DEFAULT_USER_VIDEO_FIELDS: &[&str] = &[
    "id",
    "video_description",
    "create_time",
    "username",
    "like_count",
    "comment_count",
    "share_count",
    "view_count",
    "hashtag_names",
];

const FOLLOW_FIELDS: &[&str] = &["display_name", "username"];

const COMMENT_FIELDS: &[&str] = &[
    "id",
    "video_id",
    "text",
    "like_count",
    "reply_count",
    "parent_comment_id",
    "create_time",
];

// ============================================================================
// Endpoint
// ============================================================================

/// A Research API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// `research/video/query/`
    VideoQuery,
    /// `research/user/info/`
    UserInfo,
    /// `research/user/liked_videos/`
    LikedVideos,
    /// `research/user/reposted_videos/`
    RepostedVideos,
    /// `research/user/pinned_videos/`
    PinnedVideos,
    /// `research/user/followers/`
    Followers,
    /// `research/user/following/`
    Following,
    /// `research/video/comment/list/`
    Comments,
}

impl Endpoint {
    /// Returns all endpoints.
    pub fn all() -> &'static [Endpoint] {
        &[
            Self::VideoQuery,
            Self::UserInfo,
            Self::LikedVideos,
            Self::RepostedVideos,
            Self::PinnedVideos,
            Self::Followers,
            Self::Following,
            Self::Comments,
        ]
    }

    /// Path relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::VideoQuery => "research/video/query/",
            Self::UserInfo => "research/user/info/",
            Self::LikedVideos => "research/user/liked_videos/",
            Self::RepostedVideos => "research/user/reposted_videos/",
            Self::PinnedVideos => "research/user/pinned_videos/",
            Self::Followers => "research/user/followers/",
            Self::Following => "research/user/following/",
            Self::Comments => "research/video/comment/list/",
        }
    }

    /// Key of the record array inside the response `data` object.
    ///
    /// `None` means `data` itself is the single record.
    pub fn records_key(&self) -> Option<&'static str> {
        match self {
            Self::VideoQuery => Some("videos"),
            Self::UserInfo => None,
            Self::LikedVideos => Some("user_liked_videos"),
            Self::RepostedVideos => Some("user_reposted_videos"),
            Self::PinnedVideos => Some("pinned_videos_list"),
            Self::Followers => Some("user_followers"),
            Self::Following => Some("user_following"),
            Self::Comments => Some("comments"),
        }
    }

    /// Whether the endpoint returns cursors.
    pub fn is_paginated(&self) -> bool {
        !matches!(self, Self::UserInfo | Self::PinnedVideos)
    }

    /// Whether the endpoint accepts a `fields` query parameter.
    pub fn takes_fields(&self) -> bool {
        !matches!(self, Self::Followers | Self::Following)
    }

    /// Fields the endpoint can return.
    pub fn known_fields(&self) -> &'static [&'static str] {
        match self {
            Self::VideoQuery => VIDEO_FIELDS,
            Self::UserInfo => USER_INFO_FIELDS,
            Self::LikedVideos | Self::RepostedVideos | Self::PinnedVideos => USER_VIDEO_FIELDS,
            Self::Followers | Self::Following => FOLLOW_FIELDS,
            Self::Comments => COMMENT_FIELDS,
        }
    }

    /// Fields requested when the caller does not choose any.
    pub fn default_fields(&self) -> &'static [&'static str] {
        match self {
            Self::VideoQuery => DEFAULT_VIDEO_FIELDS,
            Self::UserInfo => DEFAULT_USER_INFO_FIELDS,
            Self::LikedVideos | Self::RepostedVideos | Self::PinnedVideos => {
                DEFAULT_USER_VIDEO_FIELDS
            }
            Self::Followers | Self::Following => FOLLOW_FIELDS,
            Self::Comments => COMMENT_FIELDS,
        }
    }

    /// Highest cursor value the endpoint serves, if capped.
    pub fn cursor_ceiling(&self) -> Option<u64> {
        match self {
            Self::Comments => Some(1000),
            _ => None,
        }
    }

    /// Short machine name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VideoQuery => "video_query",
            Self::UserInfo => "user_info",
            Self::LikedVideos => "liked_videos",
            Self::RepostedVideos => "reposted_videos",
            Self::PinnedVideos => "pinned_videos",
            Self::Followers => "followers",
            Self::Following => "following",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fields_are_known() {
        for endpoint in Endpoint::all() {
            for field in endpoint.default_fields() {
                assert!(
                    endpoint.known_fields().contains(field),
                    "{endpoint}: default field {field} is not known"
                );
            }
        }
    }

    #[test]
    fn test_paths_end_with_slash() {
        for endpoint in Endpoint::all() {
            assert!(endpoint.path().starts_with("research/"));
            assert!(endpoint.path().ends_with('/'));
        }
    }

    #[test]
    fn test_single_page_endpoints() {
        assert!(!Endpoint::UserInfo.is_paginated());
        assert!(!Endpoint::PinnedVideos.is_paginated());
        assert!(Endpoint::VideoQuery.is_paginated());
        assert_eq!(Endpoint::UserInfo.records_key(), None);
    }
}
