use embassy_sync::blocking_mutex::raw::RawMutex;
use matter_bridge_icd::{
    AttributePath, AttributeReport, AttributeType, AttributeValue, BridgeEvent,
};
use tracing::trace;

use crate::listener::ListenerRegistry;

/// Forwards attribute changes to the listener. Best effort: with no
/// listener registered the change is dropped.
pub struct AttributeNotifier;

impl AttributeNotifier {
    /// Returns whether the change was handed to a listener.
    pub fn notify<M: RawMutex>(
        listeners: &ListenerRegistry<M>,
        path: AttributePath,
        ty: AttributeType,
        raw: &[u8],
    ) -> bool {
        let sent = listeners.with_listener(|listener| {
            let value = AttributeValue::decode(ty, raw);
            listener.emit(BridgeEvent::AttributeChanged(AttributeReport {
                path,
                type_tag: ty,
                value,
            }))
        });

        if sent.is_none() {
            trace!(?path, "attribute change dropped, no listener");
        }
        sent.is_some()
    }
}
