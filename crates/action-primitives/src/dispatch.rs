//! Action dispatch - one exhaustive match from action variant to controller operation

use chrono::Utc;
use perceiver_visual::{TemplateMatch, TemplateMatcher};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    controller::Controller,
    errors::{ActionError, ControllerError},
    types::{Action, ActionReport, ExecCtx},
};

/// Execute one action on a controller
///
/// Steps:
/// 1. Check cancellation and deadline (actions are never interrupted once issued)
/// 2. Check the controller can perform the required capability
/// 3. Dispatch to the controller operation, bounded by the context deadline
/// 4. Generate action report
pub async fn execute_action<C: Controller>(
    controller: &C,
    matcher: &TemplateMatcher,
    action: &Action,
    ctx: &ExecCtx,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        action_id = %ctx.action_id,
        action = %action,
        "Executing action"
    );

    // 1. Check context
    if ctx.is_cancelled() {
        return Err(ActionError::Interrupted("Context cancelled".to_string()));
    }

    if ctx.is_timeout() {
        return Err(ActionError::Timeout {
            action: action.kind().to_string(),
            timeout_ms: 0,
        });
    }

    // 2. Capability
    let capability = action.required_capability();
    if !controller.effective_capabilities().contains(capability) {
        return Err(ActionError::CapabilityUnavailable {
            action: action.kind().to_string(),
            capability,
        });
    }

    // 3. Dispatch
    let budget = ctx.remaining_time() + action.nominal_duration();
    let result = match timeout(budget, dispatch(controller, matcher, action)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(action_id = %ctx.action_id, action = action.kind(), "action timed out");
            Err(ActionError::Timeout {
                action: action.kind().to_string(),
                timeout_ms: budget.as_millis() as u64,
            })
        }
    };

    // 4. Report
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    match result {
        Ok(tapped) => {
            debug!(action_id = %ctx.action_id, latency_ms, "action completed");
            let report = ActionReport::success(action, started_at, latency_ms);
            Ok(match tapped {
                Some(point) => report.with_tap(point),
                None => report,
            })
        }
        Err(err) => {
            warn!(action_id = %ctx.action_id, error = %err, "action failed");
            Err(err)
        }
    }
}

/// Returns the tapped coordinate for template-driven taps
async fn dispatch<C: Controller>(
    controller: &C,
    matcher: &TemplateMatcher,
    action: &Action,
) -> Result<Option<(u32, u32)>, ActionError> {
    let kind = action.kind();
    let lift = |err: ControllerError| ActionError::from_controller(kind, err);

    match action {
        Action::Click { x, y } => {
            controller.tap(*x, *y).await.map_err(lift)?;
            Ok(None)
        }
        Action::Swipe(gesture) => {
            controller.swipe(gesture).await.map_err(lift)?;
            Ok(None)
        }
        Action::KeyPress { key } => {
            controller.key_event(*key).await.map_err(lift)?;
            Ok(None)
        }
        Action::Launch { package } => {
            controller.launch_app(package).await.map_err(lift)?;
            Ok(None)
        }
        Action::Wait { duration_ms } => {
            controller
                .wait(Duration::from_millis(*duration_ms))
                .await
                .map_err(lift)?;
            Ok(None)
        }
        Action::Assert { template, present } => {
            let found = locate_on_screen(controller, matcher, kind, template).await?;
            if found.is_some() != *present {
                let expectation = if *present { "present" } else { "absent" };
                return Err(ActionError::failed(
                    kind,
                    format!("expected {} to be {}", template, expectation),
                ));
            }
            Ok(None)
        }
        Action::ClickTemplate { template } => {
            let found = locate_on_screen(controller, matcher, kind, template)
                .await?
                .ok_or_else(|| ActionError::failed(kind, format!("{} not on screen", template)))?;
            let region = found
                .region
                .ok_or_else(|| ActionError::failed(kind, "scorer reported no location"))?;
            let (x, y) = region.center();
            debug!(template = %template, score = found.score, x, y, "tapping located template");
            controller.tap(x, y).await.map_err(lift)?;
            Ok(Some((x, y)))
        }
    }
}

/// Capture a frame and locate a template on it; recognition failures count as "not found"
async fn locate_on_screen<C: Controller>(
    controller: &C,
    matcher: &TemplateMatcher,
    kind: &str,
    template: &str,
) -> Result<Option<TemplateMatch>, ActionError> {
    let frame = controller
        .capture()
        .await
        .map_err(|err| ActionError::from_controller(kind, err))?;

    let matcher = matcher.clone();
    let name = template.to_string();
    let located = tokio::task::spawn_blocking(move || matcher.locate(&frame, &name))
        .await
        .map_err(|err| ActionError::failed(kind, format!("matching task failed: {}", err)))?;

    match located {
        Ok(found) => Ok(found),
        Err(err) if err.is_recognition_failure() => {
            warn!(template, error = %err, "recognition failed, treating as no match");
            Ok(None)
        }
        Err(err) => Err(ActionError::failed(kind, err.to_string())),
    }
}
