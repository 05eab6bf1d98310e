use crate::db::{NotificationMode, SubscriptionEntity};

use super::{ListInfo, StreamItem};

/// A subscription paired with the listing fetched for it in one refresh
/// cycle.
///
/// The notification mode is a snapshot taken when the update was built and
/// does not follow later changes to the subscription row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdateInfo {
    pub uid: i64,
    pub notification_mode: NotificationMode,
    pub name: String,
    pub avatar_url: String,
    pub list_info: ListInfo,
    new_streams_count: usize,
}

impl FeedUpdateInfo {
    /// `new_streams_count` is clamped to the listing size; negative counts
    /// become zero.
    pub fn new(
        uid: i64,
        notification_mode: NotificationMode,
        name: impl Into<String>,
        avatar_url: impl Into<String>,
        list_info: ListInfo,
        new_streams_count: i64,
    ) -> Self {
        let available = list_info.related_items.len();
        let new_streams_count = usize::try_from(new_streams_count)
            .unwrap_or(0)
            .min(available);

        Self {
            uid,
            notification_mode,
            name: name.into(),
            avatar_url: avatar_url.into(),
            list_info,
            new_streams_count,
        }
    }

    pub fn from_subscription(
        subscription: &SubscriptionEntity,
        list_info: ListInfo,
        new_streams_count: i64,
    ) -> Self {
        Self::new(
            subscription.uid,
            subscription.notification_mode,
            &subscription.name,
            &subscription.avatar_url,
            list_info,
            new_streams_count,
        )
    }

    /// Stable id derived from the listing URL, used to group notifications.
    pub fn pseudo_id(&self) -> i32 {
        java_string_hash(&self.list_info.url)
    }

    pub fn new_streams_count(&self) -> usize {
        self.new_streams_count
    }

    pub fn new_streams(&self) -> &[StreamItem] {
        &self.list_info.related_items[..self.new_streams_count]
    }
}

/// `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16 code units, wrapping.
fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}
