use crate::{
    error::ServiceError,
    services::announcer::{Announcement, announce},
    state::{SharedState, session::SessionSlot, state_machine::SessionEvent},
};

/// Execute a planned transition of `slot`, then announce `announcement` to the session.
///
/// The caller must hold the slot's transition gate.
pub async fn run_transition_with_announcement<F, Fut, T>(
    state: &SharedState,
    slot: &SessionSlot,
    event: SessionEvent,
    announcement: impl FnOnce(&T) -> Announcement,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (res, _next) = slot
        .run_transition(event, state.config().transition_timeout, work)
        .await?;
    announce(state, slot.key(), announcement(&res)).await;
    Ok(res)
}
