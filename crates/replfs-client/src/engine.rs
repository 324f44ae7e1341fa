//! Reliable-request engine.
//!
//! Every multi-party exchange in the protocol has the same shape: multicast
//! a request, collect replies until a predicate over the collected state
//! holds, and retransmit after each quiet window up to a retry ceiling.
//! [`drive`] implements that loop once; each operation supplies the state
//! and three closures.

use std::time::{Duration, Instant};

use replfs_net::{Channel, Endpoint, Inbound, NetResult};
use replfs_types::{Identity, MAX_ATTEMPTS};
use replfs_wire::Message;
use tracing::{debug, trace};

/// Retry ceiling and window of every exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// How long each attempt waits for replies.
    pub attempt_window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            attempt_window: Duration::from_secs(1),
        }
    }
}

/// What to send at the start of the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAttempt {
    /// Retransmit the original request.
    Retry,
    /// Send these messages instead and restart the attempt counter.
    Restart(Vec<Message>),
}

/// Runs one exchange to completion or exhaustion.
///
/// 1. Send the pending messages (initially just `request`) to the group.
/// 2. For one window, pass every valid packet addressed to this endpoint to
///    `on_reply`, stopping early once `is_done` holds.
/// 3. Ask `between_attempts` what to send next; a restart resets the
///    attempt counter.
///
/// Returns whether `is_done` finally held.
pub fn drive<C, S>(
    endpoint: &mut Endpoint<C>,
    policy: &RetryPolicy,
    request: &Message,
    state: &mut S,
    mut on_reply: impl FnMut(&mut S, &Inbound),
    is_done: impl Fn(&S) -> bool,
    mut between_attempts: impl FnMut(&mut S) -> NextAttempt,
) -> NetResult<bool>
where
    C: Channel,
{
    let name = request.message_type().name();
    let mut pending = vec![request.clone()];
    let mut attempts = 0;

    loop {
        for message in pending.drain(..) {
            endpoint.broadcast(message)?;
        }
        attempts += 1;
        debug!(request = name, attempt = attempts, "attempt");

        if pump(endpoint, policy.attempt_window, state, &mut on_reply, &is_done)? {
            return Ok(true);
        }

        match between_attempts(state) {
            NextAttempt::Retry => {
                if attempts >= policy.max_attempts {
                    debug!(request = name, attempts, "retry ceiling reached");
                    return Ok(false);
                }
                pending.push(request.clone());
            }
            NextAttempt::Restart(messages) => {
                debug!(request = name, count = messages.len(), "restarting exchange");
                attempts = 0;
                pending = messages;
            }
        }
    }
}

/// Sends `request` to the replica `to` alone and waits for its answer,
/// retransmitting after each quiet window like [`drive`].
///
/// Returns what `answer_of` extracted from the first matching reply.
pub fn ask<C, T>(
    endpoint: &mut Endpoint<C>,
    policy: &RetryPolicy,
    to: Identity,
    request: &Message,
    answer_of: impl Fn(&Message) -> Option<T>,
) -> NetResult<Option<T>>
where
    C: Channel,
{
    let name = request.message_type().name();
    let mut answer = None;

    for attempt in 1..=policy.max_attempts {
        endpoint.send(to, request.clone())?;
        debug!(request = name, to = %to, attempt, "directed attempt");

        let answered = pump(
            endpoint,
            policy.attempt_window,
            &mut answer,
            &mut |answer: &mut Option<T>, inbound: &Inbound| {
                if answer.is_none() && inbound.packet.header.source == to {
                    *answer = answer_of(&inbound.packet.message);
                }
            },
            &|answer: &Option<T>| answer.is_some(),
        )?;
        if answered {
            break;
        }
    }
    Ok(answer)
}

/// Receives for one window. Returns true as soon as `is_done` holds.
fn pump<C: Channel, S>(
    endpoint: &mut Endpoint<C>,
    window: Duration,
    state: &mut S,
    on_reply: &mut impl FnMut(&mut S, &Inbound),
    is_done: &impl Fn(&S) -> bool,
) -> NetResult<bool> {
    if is_done(state) {
        return Ok(true);
    }

    let deadline = Instant::now() + window;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        let Some(inbound) = endpoint.receive(deadline - now)? else {
            return Ok(false);
        };

        // Broadcasts and traffic for other coordinators are not replies.
        if inbound.packet.header.destination != endpoint.identity() {
            trace!(
                message = inbound.packet.message.message_type().name(),
                "ignoring packet not addressed to us"
            );
            continue;
        }

        on_reply(state, &inbound);
        if is_done(state) {
            return Ok(true);
        }
    }
}
