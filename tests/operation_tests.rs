//! Operation-level tests: each scripted conversation is driven against a
//! pre-queued register over the mock serial port.

mod common;

use common::{console_over, count_subslice, register_frame, rs232_config, Script};
use smart3_rs::config::PhysicalLayer;
use smart3_rs::constants::{ACK, DLE, PLU_BROADCAST_CONFIRM, PLU_BROADCAST_TERMINATOR};
use smart3_rs::operations::{
    BroadcastPluInfo, FinancialReportOperation, FiscalClosing, Keepalive, Operation,
    ReadPluInfo, SessionContext, Startup, Transact, WritePluInfo,
};
use smart3_rs::payload::plu::{PluInfo, Price};
use smart3_rs::payload::status::OperatingMode;
use smart3_rs::smart3::packet::{pack_packet, BroadcastPacket, Packet};
use smart3_rs::smart3::serial_mock::MockSerialPort;
use smart3_rs::Smart3Error;

fn plu(id: &str, name: &str, cents: i64, quantity: u32) -> PluInfo {
    PluInfo::new(id, name, Price::from_cents(cents), 1, 1, 0, quantity).unwrap()
}

const HELLO_STATUS: &str = "A01:068:128:192:3112991159:SMARTIII:R000001:";

#[tokio::test]
async fn startup_reads_status_and_connectability() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script
        .message(HELLO_STATUS)
        .ack()
        .message("C24:001:000:0:45:30:15:1:1:2")
        .message("C24:002:000:1:2:1:7:16:9600:2500:200:160:0")
        .message("C24:003:000:*");

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();
    Startup.execute(&mut console, &mut session).await.unwrap();

    let status = session.status.expect("status parsed");
    assert_eq!(status.mode, OperatingMode::Programming);
    assert_eq!(status.device_name, "SMARTIII");
    assert_eq!(status.serial_number, "R000001");
    assert_eq!(session.connectability.hello_interval_seconds, [45, 30, 15]);
    assert_eq!(session.connectability.retransmissions, 2);

    // Hello request, the lock/programming/connectability reply, and one
    // acknowledgement per C24 record.
    let mut expected = vec![DLE];
    expected.extend(register_frame("0;*2;+4;&m", 1));
    expected.extend([ACK, ACK, ACK]);
    assert_eq!(mock.written(), expected);
}

#[tokio::test]
async fn startup_refuses_an_open_ticket() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    // Byte 1 carries the ticket-open flag on top of Programming mode.
    script.message("A01:076:128:192:3112991159:SMARTIII:R000001:");

    let config = rs232_config();
    let mut console = console_over(mock, &config);
    let mut session = SessionContext::default();
    assert!(matches!(
        Startup.execute(&mut console, &mut session).await,
        Err(Smart3Error::TicketOpen)
    ));
}

#[tokio::test]
async fn startup_refuses_started_key_striking() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script.message("A01:100:128:192:3112991159:SMARTIII:R000001:");

    let config = rs232_config();
    let mut console = console_over(mock, &config);
    let mut session = SessionContext::default();
    assert!(matches!(
        Startup.execute(&mut console, &mut session).await,
        Err(Smart3Error::KeyStrikingStarted)
    ));
}

#[tokio::test]
async fn keepalive_answers_with_the_empty_command() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script.message(HELLO_STATUS).ack();

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();
    Keepalive.execute(&mut console, &mut session).await.unwrap();

    let mut expected = vec![DLE];
    expected.extend(register_frame("0", 1));
    assert_eq!(mock.written(), expected);
}

#[tokio::test]
async fn keepalive_translates_operating_error() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    // Byte 2 carries the operating-error flag.
    script.message("A01:068:192:192:3112991159:SMARTIII:R000001:");

    let config = rs232_config();
    let mut console = console_over(mock, &config);
    let mut session = SessionContext::default();
    assert!(matches!(
        Keepalive.execute(&mut console, &mut session).await,
        Err(Smart3Error::OperatingError)
    ));
}

#[tokio::test]
async fn read_plu_info_collects_records_until_terminator() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script
        .message(HELLO_STATUS)
        .ack()
        .message("C08:001:000:APPLE:0250:1:GOLDEN APPLE:0:0:0:2:0")
        .message("C08:002:000:BREAD:0180:2:RYE BREAD:0:0:0:1:5")
        .message("C08:003:000:*");

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();

    // The bounds arrive reversed and are normalised to ascending order.
    let mut op = ReadPluInfo::new("ZZZ", "AAA", None);
    let results = op.results();
    op.execute(&mut console, &mut session).await.unwrap();

    let records = results.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id(), "APPLE");
    assert_eq!(records[0].price(), Price::from_cents(250));
    assert_eq!(records[0].name(), "GOLDEN APPLE");
    assert_eq!(records[0].tax(), 2);
    assert_eq!(records[1].id(), "BREAD");
    assert_eq!(records[1].department(), 2);
    assert_eq!(records[1].macro_code(), 5);

    let request = register_frame("0;+4;&MAAA:ZZZ", 1);
    assert!(count_subslice(&mock.written(), &request) == 1);
}

#[tokio::test]
async fn write_plu_info_feeds_the_interactivity_loop() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script
        .message(HELLO_STATUS)
        .ack()
        .message("B81:1")
        .ack()
        .message("B81:2")
        .ack()
        .message("B81:3")
        .ack();

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();

    let plus = vec![
        plu("APPLE", "GOLDEN APPLE", 250, 1),
        plu("BREAD", "RYE BREAD", 180, 1),
    ];
    let mut op = WritePluInfo::new(plus, None);
    op.execute(&mut console, &mut session).await.unwrap();

    let written = mock.written();
    assert_eq!(
        count_subslice(&written, &register_frame("0;+4;*G", 1)),
        1
    );
    assert_eq!(
        count_subslice(
            &written,
            &register_frame("APPLE:250:1:GOLDEN APPLE:0:0:0:1:0", 2)
        ),
        1
    );
    assert_eq!(
        count_subslice(
            &written,
            &register_frame("BREAD:180:1:RYE BREAD:0:0:0:1:0", 3)
        ),
        1
    );
    // The queue drained, so the final prompt was answered with the
    // terminator.
    assert_eq!(count_subslice(&written, &register_frame("*", 4)), 1);
}

#[tokio::test(start_paused = true)]
async fn broadcast_rewinds_to_the_last_confirmed_block() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script
        .message(HELLO_STATUS)
        .ack()
        // Block 1: everything accepted.
        .message("B99:100")
        .ack()
        // Block 2: only 20 of 50 arrived.
        .message("B99:120")
        .ack()
        // Block 2 again: all confirmed.
        .message("B99:150")
        .ack();

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();

    let plus: Vec<PluInfo> = (0..150)
        .map(|i| plu(&format!("P{i:03}"), "BULK ARTICLE", 100 + i, 1))
        .collect();
    let mut op = BroadcastPluInfo::new(plus.clone(), None);
    op.execute(&mut console, &mut session).await.unwrap();

    let written = mock.written();
    assert_eq!(
        count_subslice(&written, &register_frame("0;+4;#z150", 1)),
        1
    );

    // The first block goes out once, the second block twice.
    let first_record = pack_packet(
        &Packet::Broadcast(BroadcastPacket {
            payload: plus[0].encode_broadcast_record().to_vec(),
        }),
        PhysicalLayer::Rs232,
    );
    let rewound_record = pack_packet(
        &Packet::Broadcast(BroadcastPacket {
            payload: plus[100].encode_broadcast_record().to_vec(),
        }),
        PhysicalLayer::Rs232,
    );
    assert_eq!(count_subslice(&written, &first_record), 1);
    assert_eq!(count_subslice(&written, &rewound_record), 2);

    // Three confirmation requests, one terminator.
    let confirm = pack_packet(
        &Packet::Broadcast(BroadcastPacket {
            payload: vec![PLU_BROADCAST_CONFIRM],
        }),
        PhysicalLayer::Rs232,
    );
    let terminator = pack_packet(
        &Packet::Broadcast(BroadcastPacket {
            payload: vec![PLU_BROADCAST_TERMINATOR],
        }),
        PhysicalLayer::Rs232,
    );
    assert_eq!(count_subslice(&written, &confirm), 3);
    assert_eq!(count_subslice(&written, &terminator), 1);

    // Each B99 was answered with the confirmed count.
    assert_eq!(count_subslice(&written, &register_frame("100", 2)), 1);
    assert_eq!(count_subslice(&written, &register_frame("120", 3)), 1);
    assert_eq!(count_subslice(&written, &register_frame("150", 4)), 1);
}

#[tokio::test]
async fn financial_report_accumulates_until_terminator() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script
        .message(HELLO_STATUS)
        .ack()
        .message("C22:001:000:0:T:42:I:137:1:0017")
        .message("C22:002:000:4*:C:1000:K:250:1:0017")
        .message("C22:003:000:8*:D:731:1:0017")
        .message("C22:004:000:*");

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();

    let mut op = FinancialReportOperation::new();
    let report = op.report();
    op.execute(&mut console, &mut session).await.unwrap();

    let report = report.lock().unwrap().clone();
    assert_eq!(report.tickets_issued, 42);
    assert_eq!(report.items_sold, 137);
    assert_eq!(report.payment_amount, Price::from_cents(1250));
    assert_eq!(report.drawer_amount, Price::from_cents(731));

    assert_eq!(
        count_subslice(&mock.written(), &register_frame("0;+2;*f", 1)),
        1
    );
}

#[tokio::test]
async fn fiscal_closing_answers_the_closing_prompt() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script.message(HELLO_STATUS).ack().message("B45:1").ack();

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();
    FiscalClosing.execute(&mut console, &mut session).await.unwrap();

    let written = mock.written();
    assert_eq!(count_subslice(&written, &register_frame("0;+3;#Z", 1)), 1);
    assert_eq!(count_subslice(&written, &register_frame("0", 2)), 1);
}

#[tokio::test]
async fn fiscal_closing_refuses_a_full_fiscal_memory() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    // Byte 3 carries the fiscal-memory-full flag.
    script.message("A01:068:128:200:3112991159:SMARTIII:R000001:");

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();
    assert!(matches!(
        FiscalClosing.execute(&mut console, &mut session).await,
        Err(Smart3Error::FiscalMemoryFull)
    ));
    // The status block was never answered.
    assert_eq!(mock.written(), vec![DLE]);
}

#[tokio::test]
async fn transact_drives_the_full_sale_conversation() {
    let mock = MockSerialPort::new();
    let mut script = Script::new(mock.clone());
    script
        .message(HELLO_STATUS)
        .ack()
        .message("B23:1")
        .ack()
        .message("B10:1")
        .ack()
        .message("B14:1")
        .ack()
        .message("B14:2")
        .ack()
        .message("B15:1")
        .ack()
        .message("B17:1")
        .ack()
        .message("B18:1")
        .ack();

    let config = rs232_config();
    let mut console = console_over(mock.clone(), &config);
    let mut session = SessionContext::default();

    let items = vec![plu("A", "ARTICLE A", 300, 3), plu("B", "ARTICLE B", 200, 1)];
    let mut op = Transact::new(items, Price::from_cents(1000), None);
    op.execute(&mut console, &mut session).await.unwrap();

    // The whole outbound conversation, byte for byte.
    let mut expected = vec![DLE];
    expected.extend(register_frame("0;+1", 1));
    // Clear input twice, sell 3*A.
    expected.extend(register_frame("0;#S3:3:51:42:65:62", 2));
    // Ticket start.
    expected.extend(register_frame("0", 3));
    // Sell 1*B.
    expected.extend(register_frame("0;#S49:42:66:62", 4));
    // Subtotal.
    expected.extend(register_frame("0;#S101", 5));
    // 10.00 TOTAL.
    expected.extend(register_frame("0;#S49:48:46:48:48:102", 6));
    // Payment start, ticket end.
    expected.extend(register_frame("0", 7));
    expected.extend(register_frame("0", 8));
    assert_eq!(mock.written(), expected);
}

#[tokio::test]
async fn transact_requires_items() {
    let mock = MockSerialPort::new();
    let config = rs232_config();
    let mut console = console_over(mock, &config);
    let mut session = SessionContext::default();
    let mut op = Transact::new(Vec::new(), Price::from_cents(100), None);
    assert!(matches!(
        op.execute(&mut console, &mut session).await,
        Err(Smart3Error::InvalidOperation(_))
    ));
}
