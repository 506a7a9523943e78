//! Example of using the TM1637 on an RP2040 board like the Pi Pico

#![no_std]
#![no_main]

use core::fmt::Write;
use defmt::*;
use embassy_executor::Spawner;
use embassy_rp;
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

use tm1637;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // Bit-bang the TM1637 bus on GPIO 6 (CLK) and GPIO 7 (DIO) with the blocking `embassy-time`
    // delay.  Report missing acknowledges so an unplugged display shows up in the log.
    let mut display = tm1637::Tm1637::builder()
        .with_embassy_delay()
        .with_embassy_rp_pins(p.PIN_6, p.PIN_7)
        .with_config(tm1637::Config {
            ack_policy: tm1637::AckPolicy::Report,
            ..Default::default()
        })
        .build()
        .unwrap();

    display.set_brightness(0x0A);
    if let Err(e) = display.show_text("-dE-") {
        warn!("Display not responding: {}", e);
    }
    Timer::after_millis(1000).await;

    let mut seconds: u32 = 0;

    loop {
        // Show mm:ss with the colon wired to the second digit's decimal point
        let mut text: heapless::String<8> = heapless::String::new();
        if write!(text, "{:02}:{:02}", (seconds / 60) % 100, seconds % 60).is_err() {
            error!("BUG: clock text doesn't fit");
        }

        debug!("showing {}", text.as_str());

        if let Err(e) = display.show_text(&text) {
            warn!("Display not responding: {}", e);
        }

        // Pulse the brightness once a minute
        if seconds % 60 == 0 {
            for level in (0x08..=0x0F).chain((0x08..=0x0F).rev()) {
                display.set_brightness(level);
                display.show_text(&text).ok();
                Timer::after_millis(30).await;
            }
        }

        Timer::after_millis(1000).await;
        seconds = seconds.wrapping_add(1);
    }
}
