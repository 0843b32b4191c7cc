use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use interconnect_core::control::InterconnectConfig;
use session::Session;

fn main() -> io::Result<()> {
    record_autodetect(Path::new("transcripts/emulator-autodetect.log"))?;
    record_manual(Path::new("transcripts/emulator-manual.log"))?;
    Ok(())
}

fn record_autodetect(path: &Path) -> io::Result<()> {
    let mut session = Session::new(path, InterconnectConfig::DEFAULT)?;
    session.handle_completion("ua", 2)?;
    session.handle_completion("uart a", "uart a".len())?;

    session.handle_command("uart auto")?;
    session.handle_command("plug flipped")?;
    session.handle_command("tick 3")?;
    session.handle_command("status")?;
    session.handle_command("tick 2")?;
    session.handle_command("uart")?;
    session.handle_command("tick 20")?;
    session.handle_command("plug none")?;
    session.handle_command("tick 5")?;
    session.handle_command("events")?;
    Ok(())
}

fn record_manual(path: &Path) -> io::Result<()> {
    let mut session = Session::new(path, InterconnectConfig::DEFAULT)?;
    session.handle_completion("m", 1)?;
    session.handle_completion("mux ", "mux ".len())?;
    session.handle_completion("help ", "help ".len())?;

    session.handle_command("uart on")?;
    session.handle_command("uart flip")?;
    session.handle_command("uart sideways")?;
    session.handle_command("mux a")?;
    session.handle_command("mux b")?;
    session.handle_command("mux")?;
    session.handle_command("help")?;
    Ok(())
}
