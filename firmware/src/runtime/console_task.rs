use core::fmt::Write as _;
use core::sync::atomic::Ordering;

use embassy_futures::select::{Either, select};

use super::{CONSOLE_ATTACHED, CONSOLE_LINES, CONSOLE_REPLIES, CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE};
use crate::console::{self, EchoBuffer, LineEditor, PROMPT, ReplyKind};

#[embassy_executor::task]
pub async fn run() -> ! {
    let frames_in = CONSOLE_RX_QUEUE.receiver();
    let frames_out = CONSOLE_TX_QUEUE.sender();
    let lines = CONSOLE_LINES.sender();
    let replies = CONSOLE_REPLIES.receiver();
    let mut editor = LineEditor::new();
    let mut output = EchoBuffer::new();
    let mut attached = false;

    loop {
        output.clear();

        match select(frames_in.receive(), replies.receive()).await {
            Either::First(frame) => {
                let now_attached = CONSOLE_ATTACHED.load(Ordering::Relaxed);
                if now_attached && !attached {
                    editor.reset();
                }
                attached = now_attached;

                for &byte in &frame {
                    match editor.ingest(byte, &mut output) {
                        Ok(Some(line)) => lines.send(line).await,
                        Ok(None) => {}
                        Err(error) => {
                            defmt::warn!("console: {}", defmt::Display2Format(&error));
                            let mut text: heapless::String<64> = heapless::String::new();
                            let _ = writeln!(text, "ERR {error}");
                            console::push_crlf(&mut output, &text);
                            console::push_crlf(&mut output, PROMPT);
                        }
                    }
                }
            }
            Either::Second(reply) => {
                if reply.kind == ReplyKind::Notice {
                    console::push_crlf(&mut output, "\n");
                }
                console::push_crlf(&mut output, &reply.text);
                console::push_crlf(&mut output, PROMPT);
                if reply.kind == ReplyKind::Notice {
                    let _ = output.extend_from_slice(editor.pending());
                }
            }
        }

        for frame in console::frames(&output) {
            frames_out.send(frame).await;
        }
    }
}
