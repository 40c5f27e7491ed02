//! Line-oriented shell over the session APIs.
//!
//! The core session never spawns background readers; this shell drains
//! responses itself after each command and prints them as CSV lines.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use engine_client::{run_scenario, Incoming, Protocol, Session};
use engine_codec::{csv, Request, Side};

const POST_COMMAND_DRAIN: Duration = Duration::from_millis(300);

pub async fn run(session: &mut Session) -> Result<()> {
    println!("engine-client shell. Commands:");
    print_help();

    let stdin = io::stdin();

    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!("\nEOF on stdin, exiting.");
            break;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else {
            continue;
        };

        match cmd {
            "quit" | "exit" => break,
            "help" => print_help(),
            "detect" => {
                let p = session.detect().await?;
                println!("detected: {p:?}");
            }
            "protocol" => match tokens.get(1).copied() {
                Some("binary") => session.set_protocol(Protocol::Binary),
                Some("csv") => session.set_protocol(Protocol::Csv),
                _ => println!("usage: protocol <binary|csv>"),
            },
            "order" => match parse_order(&tokens, session) {
                Some(req) => send_and_echo(session, &req).await,
                None => println!("usage: order <user> <symbol> <price> <qty> <B|S> [id]"),
            },
            "cancel" => match parse_cancel(&tokens) {
                Some(req) => send_and_echo(session, &req).await,
                None => println!("usage: cancel <user> <symbol> <order_id>"),
            },
            "flush" => send_and_echo(session, &Request::Flush).await,
            "drain" => {
                let secs = tokens
                    .get(1)
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(1);
                let drained = session.drain(Duration::from_secs(secs)).await?;
                for incoming in &drained {
                    print_incoming(incoming);
                }
                println!("({} payloads)", drained.len());
            }
            "scenario" => match tokens.get(1).and_then(|s| s.parse::<u32>().ok()) {
                Some(id) => {
                    let outcome = run_scenario(session, id).await;
                    println!("{}", outcome.stats());
                }
                None => println!("usage: scenario <id>"),
            },
            other => println!("unknown command {other:?} (try 'help')"),
        }
    }

    Ok(())
}

fn print_help() {
    println!("  order <user> <symbol> <price> <qty> <B|S> [id]");
    println!("  cancel <user> <symbol> <order_id>");
    println!("  flush");
    println!("  drain [secs]");
    println!("  scenario <id>");
    println!("  detect | protocol <binary|csv>");
    println!("  help | quit");
}

fn parse_order(tokens: &[&str], session: &mut Session) -> Option<Request> {
    if tokens.len() < 6 {
        return None;
    }
    let user = tokens[1].parse().ok()?;
    let symbol = tokens[2].to_string();
    let price = tokens[3].parse().ok()?;
    let qty = tokens[4].parse().ok()?;
    let side = match tokens[5] {
        "B" | "b" => Side::Buy,
        "S" | "s" => Side::Sell,
        _ => return None,
    };
    let id = match tokens.get(6) {
        Some(s) => s.parse().ok()?,
        None => session.next_order_id(),
    };
    Some(Request::new_order(user, symbol, price, qty, side, id))
}

fn parse_cancel(tokens: &[&str]) -> Option<Request> {
    if tokens.len() < 4 {
        return None;
    }
    Some(Request::cancel(
        tokens[1].parse().ok()?,
        tokens[2].to_string(),
        tokens[3].parse().ok()?,
    ))
}

async fn send_and_echo(session: &mut Session, req: &Request) {
    if let Err(e) = session.send_request(req).await {
        println!("send failed: {e:#}");
        return;
    }
    match session.drain(POST_COMMAND_DRAIN).await {
        Ok(drained) => {
            for incoming in &drained {
                print_incoming(incoming);
            }
        }
        Err(e) => println!("read failed: {e:#}"),
    }
}

fn print_incoming(incoming: &Incoming) {
    match incoming {
        Incoming::Event(event) => match csv::encode_event(event) {
            Ok(line) => print!("<< {line}"),
            Err(_) => println!("<< {event:?}"),
        },
        Incoming::Malformed(m) => {
            println!("<< malformed payload ({}): {} bytes", m.kind, m.raw.len());
        }
    }
}
