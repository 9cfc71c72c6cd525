//! Feed a scripted key stream through the default viewer bindings.
//!
//! Run with `RUST_LOG=keychord=trace` to watch the state machine's decisions.

use keychord::timer::ManualTimer;
use keychord::KeymapError;

fn main() -> Result<(), KeymapError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut machine = viewer_keys::default_machine(ManualTimer::new())?;

    machine.set_action_executor(|binding| {
        println!("    dispatch {} ({})", binding.action(), binding.description());
    });
    machine.set_reset_notifier(|| {
        println!("    status line cleared");
    });

    println!("typing: j k g g ? n c x");

    for key in ['j', 'k', 'g', 'g', '?', 'n', 'c', 'x'] {
        let out = machine.process_key(key);

        if out.recognizing {
            println!("{key}: waiting on \"{}\"", machine.current_sequence());
        } else if out.dispatched.is_none() {
            println!("{key}: not a binding");
        } else {
            println!("{key}: resolved");
        }
    }

    // Leave a chord half-typed, then deliver its timeout the way a host's event loop
    // would once the confirmation window passes.
    println!("typing: s, then waiting out the timeout");
    machine.process_key('s');

    while let Some((token, _)) = machine.timer_mut().pop_armed() {
        machine.timer_fired(token);
    }

    println!();
    println!("bindings:");

    for entry in machine.bindings() {
        println!("  {:4} {}", entry.keys, entry.description);
    }

    return Ok(());
}
