use core::sync::atomic::Ordering;

use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::class::cdc_acm::{ControlChanged, Receiver, Sender};
use embassy_usb::driver::{Driver, EndpointError};

use super::{CONSOLE_ATTACHED, CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE, USB_STORAGE};
use crate::console::ConsoleFrame;
use crate::usb::{self, UsbDeviceStorage, UsbDeviceStrings};

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);
    let (mut device, port) = usb::build(driver, storage, UsbDeviceStrings::default());

    let console = run_console_interface(port.sender, port.receiver, port.control);
    join(device.run(), console).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console_interface<D>(
    mut sender: Sender<'static, D>,
    mut receiver: Receiver<'static, D>,
    control: ControlChanged<'static>,
) -> !
where
    D: Driver<'static>,
{
    let rx_queue = CONSOLE_RX_QUEUE.sender();
    let tx_queue = CONSOLE_TX_QUEUE.receiver();
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut pending_tx: Option<ConsoleFrame> = None;

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &sender).await;
        pending_tx = None;
        // Drop output queued while nobody was listening.
        while tx_queue.try_receive().is_ok() {}
        CONSOLE_ATTACHED.store(true, Ordering::Relaxed);
        defmt::info!("usb: console connected");

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    let frame = match pending_tx.take() {
                        Some(frame) => frame,
                        None => tx_queue.receive().await,
                    };
                    let written = sender.write_packet(&frame).await;
                    if written.is_err() {
                        pending_tx = Some(frame);
                    }
                    written
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(0)) | Either3::Second(Ok(())) => {}
                Either3::First(Ok(count)) => match ConsoleFrame::from_slice(&ingress[..count]) {
                    Ok(frame) => rx_queue.send(frame).await,
                    Err(_) => defmt::warn!("usb: dropping console frame len={}", count),
                },
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console interface disabled");
                    break;
                }
                Either3::First(Err(_)) => defmt::warn!("usb: console read error"),
                Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console write disabled");
                    break;
                }
                Either3::Second(Err(_)) => defmt::warn!("usb: console write error"),
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: console host dropped DTR");
                        break;
                    }
                }
            }
        }

        CONSOLE_ATTACHED.store(false, Ordering::Relaxed);
    }
}

async fn wait_for_dtr<D>(control: &ControlChanged<'static>, sender: &Sender<'static, D>)
where
    D: Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
