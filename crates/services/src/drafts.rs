use planner_core::model::WeaknessRegistry;

/// Wait out every pending topic draft and commit it.
///
/// With a real clock this sleeps until each deadline; a fixed clock is moved
/// forward instead so tests never block. Returns the number of drafts committed.
pub async fn settle_drafts(registry: &mut WeaknessRegistry) -> usize {
    let mut committed = registry.commit_due();
    while let Some(deadline) = registry.next_deadline() {
        let now = registry.clock().now();
        if deadline > now {
            if registry.clock().is_fixed() {
                registry.clock_mut().advance(deadline - now);
            } else {
                let wait = (deadline - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
            }
        }
        committed += registry.commit_due();
    }
    if committed > 0 {
        tracing::debug!(committed, "settled pending topic drafts");
    }
    committed
}
