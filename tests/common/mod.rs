//! Shared test support: scripted conversations over the mock serial port
//! and a small reactive register simulator for full-session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smart3_rs::config::{PhysicalLayer, Smart3Config};
use smart3_rs::constants::{ACK, BEL, CAN, DC1, DLE, EOT, LENGTH_BIAS, NAK, SYN};
use smart3_rs::payload::message::MessageData;
use smart3_rs::payload::plu::PluInfo;
use smart3_rs::smart3::console::Console;
use smart3_rs::smart3::packet::{pack_packet, MessagePacket, Packet};
use smart3_rs::smart3::serial::Smart3Port;
use smart3_rs::smart3::serial_mock::MockSerialPort;
use smart3_rs::smart3::transceiver::Transceiver;

pub fn rs232_config() -> Smart3Config {
    Smart3Config {
        receive_timeout_ms: 1000,
        write_timeout_ms: 1000,
        ..Smart3Config::default()
    }
}

pub fn console_over(mock: MockSerialPort, config: &Smart3Config) -> Console<MockSerialPort> {
    let port = Smart3Port::new(mock, config);
    Console::new(Transceiver::new(port, config).unwrap())
}

/// Encodes a register-side message frame.
pub fn register_frame(payload: &str, sequence: u8) -> Vec<u8> {
    pack_packet(
        &Packet::Message(MessagePacket {
            address: None,
            sequence,
            crn: 0,
            data: MessageData::new(payload).unwrap(),
        }),
        PhysicalLayer::Rs232,
    )
}

/// Pre-queued register script: messages carry increasing sequence numbers.
pub struct Script {
    mock: MockSerialPort,
    sequence: u8,
}

impl Script {
    pub fn new(mock: MockSerialPort) -> Self {
        Script { mock, sequence: 1 }
    }

    pub fn message(&mut self, payload: &str) -> &mut Self {
        self.mock.queue_bytes(&register_frame(payload, self.sequence));
        self.sequence = self.sequence.wrapping_add(1);
        self
    }

    pub fn ack(&mut self) -> &mut Self {
        self.mock.queue_bytes(&[ACK]);
        self
    }

    pub fn nak(&mut self) -> &mut Self {
        self.mock.queue_bytes(&[NAK]);
        self
    }

    pub fn can(&mut self) -> &mut Self {
        self.mock.queue_bytes(&[CAN]);
        self
    }

    pub fn syn(&mut self) -> &mut Self {
        self.mock.queue_bytes(&[SYN]);
        self
    }

    pub fn bel(&mut self) -> &mut Self {
        self.mock.queue_bytes(&[BEL]);
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.mock.queue_bytes(bytes);
        self
    }
}

pub fn count_subslice(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    count_subslice(haystack, needle) > 0
}

/// Configuration of the reactive register simulator.
pub struct RegisterSimConfig {
    /// Payload answered to every hello request.
    pub status_payload: String,
    /// C24 record payloads transmitted during startup, terminator included.
    pub c24_records: Vec<String>,
    /// PLU records the register knows.
    pub plu_table: Vec<PluInfo>,
}

impl Default for RegisterSimConfig {
    fn default() -> Self {
        RegisterSimConfig {
            status_payload: "A01:068:128:192:3112991159:SMARTIII:R000001:".to_string(),
            c24_records: vec![
                "C24:001:000:0:45:30:15:0:0:0".to_string(),
                "C24:002:000:1:2:1:0:16:9600:2500:200:160:0".to_string(),
                "C24:003:000:*".to_string(),
            ],
            plu_table: Vec::new(),
        }
    }
}

/// What the next host message frame answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sent {
    A01,
    B23,
    B10,
    B14,
    B15,
    B17,
    B18,
    B45,
    B81,
}

/// A register simulator reacting to the host's outbound bytes. It covers
/// the message dialogues (hello/status, C24/C08 series, B81 writes and the
/// sale interactivity chain); broadcast loading is exercised with
/// pre-queued scripts instead.
pub struct RegisterSim {
    mock: MockSerialPort,
    config: RegisterSimConfig,
    /// Every message payload the host has sent, in order.
    pub host_messages: Arc<Mutex<Vec<String>>>,
}

impl RegisterSim {
    pub fn new(mock: MockSerialPort, config: RegisterSimConfig) -> Self {
        RegisterSim {
            mock,
            config,
            host_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawns the simulator; it runs until the test ends.
    pub fn spawn(self) -> (Arc<Mutex<Vec<String>>>, tokio::task::JoinHandle<()>) {
        let log = Arc::clone(&self.host_messages);
        let handle = tokio::spawn(self.run());
        (log, handle)
    }

    async fn run(self) {
        let mut cursor = 0usize;
        let mut sequence: u8 = 1;
        let mut awaiting: VecDeque<Sent> = VecDeque::new();
        let mut last_frame: Vec<u8> = Vec::new();

        let mut send = |payload: &str, sequence: &mut u8, last_frame: &mut Vec<u8>| {
            let frame = register_frame(payload, *sequence);
            *sequence = sequence.wrapping_add(1);
            *last_frame = frame.clone();
            self.mock.queue_bytes(&frame);
        };

        loop {
            let written = self.mock.written();
            if cursor >= written.len() {
                tokio::time::sleep(Duration::from_millis(1)).await;
                continue;
            }
            let byte = written[cursor];
            if byte == EOT {
                // A message frame; wait until it is complete.
                if written.len() < cursor + 2 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    continue;
                }
                let total = (written[cursor + 1].wrapping_sub(LENGTH_BIAS)) as usize;
                if written.len() < cursor + total {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    continue;
                }
                let frame = &written[cursor..cursor + total];
                cursor += total;
                let payload = String::from_utf8_lossy(&frame[4..total - 3]).to_string();
                self.host_messages.lock().unwrap().push(payload.clone());
                self.mock.queue_bytes(&[ACK]);

                match awaiting.pop_front() {
                    None | Some(Sent::A01) => {
                        if payload.contains("&m") {
                            for record in &self.config.c24_records {
                                send(record, &mut sequence, &mut last_frame);
                            }
                        } else if let Some(range) = payload.split("&M").nth(1) {
                            let (from, to) = range.split_once(':').unwrap_or((range, range));
                            let mut index = 1;
                            for plu in &self.config.plu_table {
                                if plu.id() >= from && plu.id() <= to {
                                    send(
                                        &format!(
                                            "C08:{:03}:000:{}:{}:{}:{}:0:0:0:{}:{}",
                                            index,
                                            plu.id(),
                                            plu.price().cents(),
                                            plu.department(),
                                            plu.name(),
                                            plu.tax(),
                                            plu.macro_code()
                                        ),
                                        &mut sequence,
                                        &mut last_frame,
                                    );
                                    index += 1;
                                }
                            }
                            send("C08:999:000:*", &mut sequence, &mut last_frame);
                        } else if payload.contains("*G") {
                            awaiting.push_back(Sent::B81);
                            send("B81:1", &mut sequence, &mut last_frame);
                        } else if payload.contains("#Z") {
                            awaiting.push_back(Sent::B45);
                            send("B45:1", &mut sequence, &mut last_frame);
                        } else if payload.contains("+1") {
                            awaiting.push_back(Sent::B23);
                            send("B23:1", &mut sequence, &mut last_frame);
                        } else if payload.contains("+0") {
                            awaiting.push_back(Sent::B23);
                            send("B23:1", &mut sequence, &mut last_frame);
                        }
                        // A plain "0" needs no follow-up.
                    }
                    Some(Sent::B23) => {
                        if payload.contains("#A") {
                            // Final hello before disconnection; the host
                            // swallows it without acknowledging.
                            send(&self.config.status_payload, &mut sequence, &mut last_frame);
                        } else if payload.contains("#S") {
                            awaiting.push_back(Sent::B10);
                            send("B10:1", &mut sequence, &mut last_frame);
                        }
                    }
                    Some(Sent::B10) => {
                        awaiting.push_back(Sent::B14);
                        send("B14:1", &mut sequence, &mut last_frame);
                    }
                    Some(Sent::B14) => {
                        if payload == "0;#S101" {
                            awaiting.push_back(Sent::B15);
                            send("B15:1", &mut sequence, &mut last_frame);
                        } else {
                            awaiting.push_back(Sent::B14);
                            send("B14:1", &mut sequence, &mut last_frame);
                        }
                    }
                    Some(Sent::B15) => {
                        awaiting.push_back(Sent::B17);
                        send("B17:1", &mut sequence, &mut last_frame);
                    }
                    Some(Sent::B17) => {
                        awaiting.push_back(Sent::B18);
                        send("B18:1", &mut sequence, &mut last_frame);
                    }
                    Some(Sent::B18) | Some(Sent::B45) => {}
                    Some(Sent::B81) => {
                        if payload != "*" {
                            awaiting.push_back(Sent::B81);
                            send("B81:1", &mut sequence, &mut last_frame);
                        }
                    }
                }
            } else {
                cursor += 1;
                match byte {
                    DLE | DC1 => {
                        // Every operation opens with a hello; drop any
                        // stale dialogue expectations.
                        awaiting.clear();
                        awaiting.push_back(Sent::A01);
                        send(&self.config.status_payload, &mut sequence, &mut last_frame);
                    }
                    NAK => {
                        let frame = last_frame.clone();
                        self.mock.queue_bytes(&frame);
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Polls the simulator log until a message containing `needle` appears.
pub async fn wait_for_message(
    log: &Arc<Mutex<Vec<String>>>,
    needle: &str,
    limit: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if log.lock().unwrap().iter().any(|m| m.contains(needle)) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
