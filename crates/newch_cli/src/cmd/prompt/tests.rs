use std::sync::mpsc;
use std::time::Duration;

use newch::dock::{DockCommand, DockPacket, DockSession, SessionState};
use newch_testkit::{KeyboardReply, NewtonScript, ScriptedNewton, scripted_session};

use super::CommandPrompt;
use crate::cmd::error::CliError;

fn docked(script: NewtonScript) -> DockSession<ScriptedNewton> {
	let mut session = scripted_session(script);
	session.connect().expect("docks");
	session
}

fn output(prompt: CommandPrompt<'_, ScriptedNewton, Vec<u8>>) -> String {
	String::from_utf8(prompt.into_output()).expect("utf8 output")
}

#[test]
fn keyboard_then_text_is_typed() {
	let mut session = docked(NewtonScript::default());
	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	prompt.handle_line("keyboard").expect("passthrough");
	prompt.handle_line("Hello Newton").expect("typed");
	prompt.handle_line("keyboard").expect("typed as text");
	assert_eq!(output(prompt), "keyboard passthrough active\n");

	assert_eq!(session.state(), SessionState::KeyboardPassthrough);
	assert_eq!(session.writer().typed(), "Hello Newtonkeyboard");
}

#[test]
fn passthrough_forwards_whitespace_lines() {
	let mut session = docked(NewtonScript::default());
	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	prompt.handle_line("keyboard").expect("passthrough");
	prompt.handle_line("").expect("empty skipped");
	prompt.handle_line("   ").expect("typed");
	drop(prompt);
	assert_eq!(session.writer().typed(), "   ");
}

#[test]
fn unknown_command_gets_diagnostic() {
	let mut session = docked(NewtonScript::default());
	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	prompt.handle_line("sync").expect("diagnostic only");
	prompt.handle_line("   ").expect("blank ignored");
	assert_eq!(output(prompt), "unknown command `sync` (available: keyboard)\n");
	assert!(!session.writer().received_commands().contains(&DockCommand::KEYBOARD_STRING));
}

#[test]
fn refused_passthrough_prints_error_and_continues() {
	let mut session = docked(NewtonScript {
		keyboard: KeyboardReply::Refuse(-10),
		..NewtonScript::default()
	});
	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	prompt.handle_line("keyboard").expect("rejection is not fatal");
	prompt.handle_line("typed too early").expect("diagnostic only");

	let text = output(prompt);
	assert!(text.starts_with("error: "), "{text}");
	assert!(text.contains("-10"), "{text}");
	assert!(text.contains("unknown command `typed too early`"), "{text}");
	assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn silent_newton_ends_prompt_with_error() {
	let mut session = docked(NewtonScript {
		keyboard: KeyboardReply::Silent,
		..NewtonScript::default()
	});
	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	let err = prompt.handle_line("keyboard").expect_err("timeout is fatal");
	assert!(matches!(err, CliError::Connection(_)), "got {err}");
}

#[test]
fn end_of_input_disconnects() {
	let mut session = docked(NewtonScript::default());
	let (tx, rx) = mpsc::channel();
	tx.send("keyboard".to_owned()).expect("queue");
	tx.send("abc".to_owned()).expect("queue");
	drop(tx);

	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	prompt.run(&rx).expect("clean exit");
	assert_eq!(output(prompt), "keyboard passthrough active\ndisconnected\n");
	assert_eq!(session.writer().typed(), "abc");
	assert_eq!(session.writer().received_commands().last(), Some(&DockCommand::DISCONNECT));
}

#[test]
fn newton_hangup_ends_prompt() {
	let mut session = docked(NewtonScript::default());
	session.writer().inject(DockPacket::empty(DockCommand::DISCONNECT));
	let (_tx, rx) = mpsc::channel::<String>();

	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	let err = prompt.run(&rx).expect_err("peer closed");
	assert!(matches!(err, CliError::SessionClosed { ref reason } if reason.contains("newton disconnected")), "got {err}");
	assert_eq!(output(prompt), "disconnected: newton disconnected\n");
}

#[test]
fn newton_cancel_returns_to_commands() {
	let mut session = docked(NewtonScript::default());
	session.start_keyboard_passthrough().expect("passthrough");
	session.writer().inject(DockPacket::empty(DockCommand::OPERATION_CANCELED));
	session.wait_for(|state| state == SessionState::Connected, Duration::from_secs(1)).expect("cancelled");

	let mut prompt = CommandPrompt::new(&mut session, Vec::new());
	prompt.handle_line("keyboard").expect("command again");
	assert_eq!(output(prompt), "keyboard passthrough active\n");
	assert_eq!(session.writer().typed(), "");
}
