//! Proptest generators for property-based testing.

use proptest::prelude::*;

use teamcal::NewEvent;
use teamcal_core::EventType;
use teamcal_crypto::{MasterKey, UserKey};

/// Generate a user data key.
pub fn user_key() -> impl Strategy<Value = UserKey> {
    any::<[u8; 32]>().prop_map(UserKey::from_bytes)
}

/// Generate a master key.
pub fn master_key() -> impl Strategy<Value = MasterKey> {
    any::<[u8; 32]>().prop_map(MasterKey::from_bytes)
}

/// Generate an event type.
pub fn event_type() -> impl Strategy<Value = EventType> {
    prop::sample::select(EventType::ALL.to_vec())
}

/// Generate a non-blank title and a free-form description, including
/// non-ASCII text and JSON metacharacters.
pub fn event_text() -> impl Strategy<Value = (String, String)> {
    (
        "[a-zA-Z0-9][ a-zA-Z0-9\"\\\\{}éü日本]{0,40}",
        "[ -~éü日本\n]{0,200}",
    )
}

/// Generate a `(start, end)` window with `end > start`.
pub fn time_window() -> impl Strategy<Value = (i64, i64)> {
    (0i64..=4_102_444_800_000, 1i64..=30 * 24 * 3_600_000)
        .prop_map(|(start, len)| (start, start + len))
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct NewEventParams {
    pub title: String,
    pub description: String,
    pub start_time: i64,
    pub end_time: i64,
    pub is_private: bool,
    pub event_type: EventType,
}

impl Arbitrary for NewEventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (event_text(), time_window(), any::<bool>(), event_type())
            .prop_map(|((title, description), (start_time, end_time), is_private, event_type)| {
                NewEventParams {
                    title,
                    description,
                    start_time,
                    end_time,
                    is_private,
                    event_type,
                }
            })
            .boxed()
    }
}

impl NewEventParams {
    pub fn to_new_event(&self) -> NewEvent {
        let mut event = NewEvent::new(self.title.clone(), self.start_time, self.end_time)
            .description(self.description.clone())
            .event_type(self.event_type);
        if self.is_private {
            event = event.private();
        }
        event
    }
}
