//! End-to-end scenarios against a scripted in-process server.
//!
//! The fake server sits on the far side of the link driver interface: every
//! frame the engine emits is recorded and answered synchronously through
//! the inbox, so the full path from host call to wire and back is covered
//! without a network.

use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use etherdfs::host::{
    CDS_LEN, FOUND_FILE_LEN, FoundFile, SEARCH_BLOCK_LEN, SFT_LEN, SearchBlock, Sft,
};
use etherdfs::session::{Config, Session};
use etherdfs::{
    Dispatch, DosError, FRAME_MIN, FRAME_SIZE, HostCall, Inbox, LinkDriver, PAYLOAD_OFFSET, Regs,
    TickSource,
};

const LOCAL_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x33];
const SERVER_MAC: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01];

type Handler = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

struct FakeServer {
    inbox: Arc<Inbox>,
    requests: Mutex<Vec<Vec<u8>>>,
    handler: Mutex<Handler>,
}

impl FakeServer {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LinkDriver for FakeServer {
    fn send(&self, frame: &[u8]) -> io::Result<()> {
        self.requests.lock().unwrap().push(frame.to_vec());
        let mut handler = self.handler.lock().unwrap();
        let reply = (&mut **handler)(frame);
        drop(handler);
        if let Some(reply) = reply {
            if let Some(mut slot) = self.inbox.begin_receive(reply.len()) {
                slot.buffer().copy_from_slice(&reply);
                slot.commit();
            }
        }
        Ok(())
    }
}

/// Advances one tick per probe so per-attempt timeouts expire quickly.
struct FastTicks(AtomicU8);

impl TickSource for FastTicks {
    fn tick(&self) -> u8 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

fn checksum(data: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    for &b in data {
        sum = sum.rotate_right(1).wrapping_add(u16::from(b));
    }
    sum
}

fn announced_len(frame: &[u8]) -> usize {
    u16::from_le_bytes([frame[52], frame[53]]) as usize
}

fn payload_of(frame: &[u8]) -> &[u8] {
    &frame[PAYLOAD_OFFSET..announced_len(frame)]
}

fn reply_frame(request: &[u8], ax: u16, payload: &[u8]) -> Vec<u8> {
    let announced = (PAYLOAD_OFFSET + payload.len()).max(FRAME_MIN);
    let mut frame = vec![0u8; announced];
    frame[0..6].copy_from_slice(&request[6..12]);
    frame[6..12].copy_from_slice(&SERVER_MAC);
    frame[12..14].copy_from_slice(&[0xED, 0xF5]);
    frame[52..54].copy_from_slice(&(announced as u16).to_le_bytes());
    frame[56] = request[56];
    frame[57] = request[57];
    frame[58..60].copy_from_slice(&ax.to_le_bytes());
    frame[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    if frame[56] & 0x80 != 0 {
        let sum = checksum(&frame[56..announced]);
        frame[54..56].copy_from_slice(&sum.to_le_bytes());
    }
    frame
}

fn open_reply(attr: u8, name: &[u8; 11], time: u32, size: u32, fileid: u16, mode: u16) -> Vec<u8> {
    let mut p = vec![0u8; 25];
    p[0] = attr;
    p[1..12].copy_from_slice(name);
    p[12..16].copy_from_slice(&time.to_le_bytes());
    p[16..20].copy_from_slice(&size.to_le_bytes());
    p[20..22].copy_from_slice(&fileid.to_le_bytes());
    p[22..24].copy_from_slice(&mode.to_le_bytes());
    p
}

#[allow(clippy::too_many_arguments)]
fn find_reply(
    attr: u8,
    name: &[u8; 11],
    time: u16,
    date: u16,
    size: u32,
    parent: u16,
    dir_entry: u16,
) -> Vec<u8> {
    let mut p = vec![0u8; 24];
    p[0] = attr;
    p[1..12].copy_from_slice(name);
    p[12..14].copy_from_slice(&time.to_le_bytes());
    p[14..16].copy_from_slice(&date.to_le_bytes());
    p[16..20].copy_from_slice(&size.to_le_bytes());
    p[20..22].copy_from_slice(&parent.to_le_bytes());
    p[22..24].copy_from_slice(&dir_entry.to_le_bytes());
    p
}

fn serve(
    handler: impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    config: Config,
) -> (Session, Arc<FakeServer>) {
    let inbox = Inbox::new();
    let server = Arc::new(FakeServer {
        inbox: inbox.clone(),
        requests: Mutex::new(Vec::new()),
        handler: Mutex::new(Box::new(handler)),
    });
    let driver: Arc<dyn LinkDriver> = server.clone();
    let session = Session::new(
        driver,
        inbox,
        Box::new(FastTicks(AtomicU8::new(0))),
        LOCAL_MAC,
        config,
    )
    .expect("install failed");
    (session, server)
}

/// F: maps to the server's C:.
fn f_to_c() -> Config {
    Config {
        peer: Some(SERVER_MAC),
        mappings: vec![(5, 2)],
        checksum: true,
    }
}

fn remote_file_sft(fileid: u16, pos: u32, size: u32) -> [u8; SFT_LEN] {
    let mut raw = [0u8; SFT_LEN];
    let sft = Sft::view_mut(&mut raw).unwrap();
    sft.open_mode.set(2); // read/write
    sft.dev_info.set(0x8040 | 5);
    sft.fileid.set(fileid);
    sft.file_pos.set(pos);
    sft.file_size.set(size);
    raw
}

fn cds_with_path(path: &[u8]) -> [u8; CDS_LEN] {
    let mut raw = [0u8; CDS_LEN];
    raw[..path.len()].copy_from_slice(path);
    raw
}

fn unwrap_regs(dispatch: Dispatch) -> Regs {
    match dispatch {
        Dispatch::Handled(Ok(regs)) => regs,
        other => panic!("expected success, got {other:?}"),
    }
}

fn unwrap_err(dispatch: Dispatch) -> DosError {
    match dispatch {
        Dispatch::Handled(Err(err)) => err,
        other => panic!("expected a host error, got {other:?}"),
    }
}

#[test]
fn open_read_close() {
    let (mut session, server) = serve(
        |req| {
            assert_eq!(req[58], 2, "remote drive ordinal");
            let payload = payload_of(req);
            match req[59] {
                0x16 => {
                    assert_eq!(&payload[..6], &[0; 6]);
                    assert_eq!(&payload[6..], b"\\HELLO.TXT");
                    Some(reply_frame(
                        req,
                        0,
                        &open_reply(0x20, b"HELLO   TXT", 0x0011_2233, 5, 0x4242, 2),
                    ))
                }
                0x08 => {
                    assert_eq!(payload, &[0, 0, 0, 0, 0x42, 0x42, 5, 0]);
                    Some(reply_frame(req, 0, b"Hello"))
                }
                0x06 => {
                    assert_eq!(payload, &[0x42, 0x42]);
                    Some(reply_frame(req, 0, &[]))
                }
                other => panic!("unexpected op {other:#04x}"),
            }
        },
        f_to_c(),
    );

    let mut sft = [0u8; SFT_LEN];
    unwrap_regs(session.redirector().dispatch(HostCall::Open {
        sft: &mut sft,
        path: b"F:\\HELLO.TXT",
        stack_word: 0,
    }));
    {
        let sft = Sft::view(&sft).unwrap();
        assert_eq!(sft.fileid.get(), 0x4242);
        assert_eq!(sft.file_size.get(), 5);
        assert_eq!(sft.file_pos.get(), 0);
        assert_eq!(sft.file_time.get(), 0x0011_2233);
        assert_eq!(sft.file_attr, 0x20);
        assert_eq!(sft.dev_info.get(), 0x8040 | 5);
        assert_eq!(sft.open_mode.get(), 2);
        assert_eq!(sft.rel_sector.get(), 0xFFFF);
        assert_eq!(sft.abs_sector.get(), 0xFFFF);
        assert_eq!(sft.dir_entry_no, 0xFF);
        assert_eq!(&sft.file_name, b"HELLO   TXT");
    }

    let mut dta = [0u8; 16];
    let regs = unwrap_regs(session.redirector().dispatch(HostCall::Read {
        sft: &mut sft,
        dta: &mut dta,
        count: 5,
    }));
    assert_eq!(regs.cx, 5);
    assert_eq!(&dta[..5], b"Hello");
    assert_eq!(Sft::view(&sft).unwrap().file_pos.get(), 5);

    Sft::view_mut(&mut sft).unwrap().handle_count.set(1);
    unwrap_regs(session.redirector().dispatch(HostCall::Close { sft: &mut sft }));
    assert_eq!(Sft::view(&sft).unwrap().handle_count.get(), 0);

    // Every emitted frame respects the size invariants, announces its own
    // length, addresses the peer and carries a valid checksum.
    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    for frame in requests.iter() {
        assert!(frame.len() >= FRAME_MIN && frame.len() <= FRAME_SIZE);
        assert_eq!(announced_len(frame), frame.len());
        assert_eq!(&frame[0..6], &SERVER_MAC[..]);
        assert_eq!(&frame[6..12], &LOCAL_MAC[..]);
        assert_eq!(&frame[12..14], &[0xED, 0xF5]);
        assert_eq!(
            u16::from_le_bytes([frame[54], frame[55]]),
            checksum(&frame[56..frame.len()])
        );
    }
}

#[test]
fn zero_byte_write_truncates() {
    let (mut session, server) = serve(
        |req| {
            assert_eq!(req[59], 0x09);
            assert_eq!(payload_of(req), &[3, 0, 0, 0, 0x42, 0x42]);
            Some(reply_frame(req, 0, &0u16.to_le_bytes()))
        },
        f_to_c(),
    );

    let mut sft = remote_file_sft(0x4242, 3, 5);
    let regs = unwrap_regs(
        session
            .redirector()
            .dispatch(HostCall::Write { sft: &mut sft, data: &[] }),
    );
    assert_eq!(regs.cx, 0);
    let sft = Sft::view(&sft).unwrap();
    assert_eq!(sft.file_pos.get(), 3);
    assert_eq!(sft.file_size.get(), 3, "truncated to the current position");
    assert_eq!(server.request_count(), 1, "truncation still sends one frame");
}

#[test]
fn corrupted_replies_exhaust_the_retry_budget() {
    let (mut session, server) = serve(
        |req| {
            let mut reply = reply_frame(req, 0, &[0; 9]);
            reply[PAYLOAD_OFFSET] ^= 0x40; // corrupt one payload bit after sealing
            Some(reply)
        },
        f_to_c(),
    );
    let err = unwrap_err(
        session
            .redirector()
            .dispatch(HostCall::GetAttr { path: b"F:\\X.TXT" }),
    );
    assert_eq!(err, DosError::FILE_NOT_FOUND);
    assert_eq!(server.request_count(), 5, "five transmissions, then give up");
}

#[test]
fn silent_server_ends_enumeration() {
    let (mut session, server) = serve(|_| None, f_to_c());
    let mut cursor = [0u8; SEARCH_BLOCK_LEN];
    cursor[0] = 0x80 | 5;
    let mut found = [0u8; FOUND_FILE_LEN];
    let err = unwrap_err(session.redirector().dispatch(HostCall::FindNext {
        cursor: &mut cursor,
        found: &mut found,
    }));
    assert_eq!(err, DosError::NO_MORE_FILES);
    assert_eq!(server.request_count(), 5);
}

#[test]
fn discovery_adopts_the_answering_server() {
    let mut first = true;
    let (mut session, server) = serve(
        move |req| {
            if first {
                first = false;
                assert_eq!(&req[0..6], &[0xFF; 6], "discovery goes to broadcast");
            } else {
                assert_eq!(&req[0..6], &SERVER_MAC[..], "follow-ups go to the peer");
            }
            assert_eq!(req[59], 0x0C);
            let mut payload = [0u8; 6];
            payload[0..2].copy_from_slice(&1000u16.to_le_bytes());
            payload[2..4].copy_from_slice(&512u16.to_le_bytes());
            payload[4..6].copy_from_slice(&250u16.to_le_bytes());
            Some(reply_frame(req, 8, &payload))
        },
        Config {
            peer: None,
            mappings: vec![(5, 2)],
            checksum: true,
        },
    );
    assert_eq!(session.peer(), SERVER_MAC);

    let cds = cds_with_path(b"F:\\");
    let regs = unwrap_regs(session.redirector().dispatch(HostCall::DiskSpace { cds: &cds }));
    assert_eq!(regs.ax, 8, "sectors per cluster from the result word");
    assert_eq!(regs.bx, 1000);
    assert_eq!(regs.cx, 512);
    assert_eq!(regs.dx, 250);
    assert_eq!(server.request_count(), 2);
}

#[test]
fn wildcard_open_fails_without_wire_traffic() {
    let (mut session, server) = serve(|_| panic!("no wire traffic expected"), f_to_c());
    let mut sft = [0u8; SFT_LEN];
    let err = unwrap_err(session.redirector().dispatch(HostCall::Open {
        sft: &mut sft,
        path: b"F:\\A*.TXT",
        stack_word: 0,
    }));
    assert_eq!(err, DosError::PATH_NOT_FOUND);
    assert_eq!(server.request_count(), 0);
}

#[test]
fn cross_drive_rename_fails_without_wire_traffic() {
    let (mut session, server) = serve(|_| panic!("no wire traffic expected"), f_to_c());
    let err = unwrap_err(session.redirector().dispatch(HostCall::Rename {
        old: b"F:\\X",
        new: b"G:\\Y",
    }));
    assert_eq!(err, DosError::FILE_NOT_FOUND);
    assert_eq!(server.request_count(), 0);
}

#[test]
fn unmapped_drives_chain_to_the_previous_handler() {
    let (mut session, server) = serve(|_| panic!("no wire traffic expected"), f_to_c());
    match session
        .redirector()
        .dispatch(HostCall::Delete { path: b"Z:\\X.TXT" })
    {
        Dispatch::Chain => {}
        other => panic!("expected chain, got {other:?}"),
    }
    assert_eq!(server.request_count(), 0);
}

#[test]
fn chunked_read_crosses_frame_boundaries() {
    const TOTAL: usize = 2000; // two chunks: 1030 + 970
    let (mut session, server) = serve(
        |req| {
            assert_eq!(req[59], 0x08);
            let payload = payload_of(req);
            let offset = u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize;
            let len = usize::from(u16::from_le_bytes(payload[6..8].try_into().unwrap()));
            let data: Vec<u8> = (offset..offset + len).map(|i| i as u8).collect();
            Some(reply_frame(req, 0, &data))
        },
        f_to_c(),
    );
    let mut sft = remote_file_sft(0x0101, 0, TOTAL as u32);
    let mut dta = [0u8; TOTAL];
    let regs = unwrap_regs(session.redirector().dispatch(HostCall::Read {
        sft: &mut sft,
        dta: &mut dta,
        count: TOTAL as u16,
    }));
    assert_eq!(usize::from(regs.cx), TOTAL);
    assert_eq!(Sft::view(&sft).unwrap().file_pos.get(), TOTAL as u32);
    assert!(dta.iter().enumerate().all(|(i, &b)| b == i as u8));
    assert_eq!(server.request_count(), 2);
}

#[test]
fn short_reply_ends_a_read_at_server_eof() {
    let (mut session, server) = serve(|req| Some(reply_frame(req, 0, b"partial")), f_to_c());
    let mut sft = remote_file_sft(0x0101, 0, 7);
    let mut dta = [0u8; 100];
    let regs = unwrap_regs(session.redirector().dispatch(HostCall::Read {
        sft: &mut sft,
        dta: &mut dta,
        count: 100,
    }));
    assert_eq!(regs.cx, 7);
    assert_eq!(&dta[..7], b"partial");
    assert_eq!(Sft::view(&sft).unwrap().file_pos.get(), 7);
    assert_eq!(server.request_count(), 1);
}

#[test]
fn short_write_reports_the_partial_count() {
    let (mut session, server) = serve(
        |req| {
            let sent = payload_of(req).len() - 6;
            let accepted = sent.min(500) as u16;
            Some(reply_frame(req, 0, &accepted.to_le_bytes()))
        },
        f_to_c(),
    );
    let data = vec![0x55u8; 1500];
    let mut sft = remote_file_sft(0x0101, 0, 0);
    let regs = unwrap_regs(
        session
            .redirector()
            .dispatch(HostCall::Write { sft: &mut sft, data: &data }),
    );
    assert_eq!(regs.cx, 500, "partial server write is success by count");
    let sft = Sft::view(&sft).unwrap();
    assert_eq!(sft.file_pos.get(), 500);
    assert_eq!(sft.file_size.get(), 500);
    assert_eq!(server.request_count(), 1);
}

#[test]
fn full_write_grows_the_file() {
    let (mut session, server) = serve(
        |req| {
            let sent = (payload_of(req).len() - 6) as u16;
            Some(reply_frame(req, 0, &sent.to_le_bytes()))
        },
        f_to_c(),
    );
    let data = vec![0xA5u8; 1500]; // chunks of 1024 + 476
    let mut sft = remote_file_sft(0x0101, 100, 200);
    let regs = unwrap_regs(
        session
            .redirector()
            .dispatch(HostCall::Write { sft: &mut sft, data: &data }),
    );
    assert_eq!(regs.cx, 1500);
    let sft = Sft::view(&sft).unwrap();
    assert_eq!(sft.file_pos.get(), 1600);
    assert_eq!(sft.file_size.get(), 1600);
    assert_eq!(server.request_count(), 2);
}

#[test]
fn enumeration_round_trip() {
    let (mut session, _) = serve(
        |req| {
            let payload = payload_of(req);
            match req[59] {
                0x1B => {
                    assert_eq!(payload[0], 0x3F);
                    assert_eq!(&payload[1..], b"\\*.TXT");
                    Some(reply_frame(
                        req,
                        0,
                        &find_reply(0x20, b"AFILE   TXT", 0x6021, 0x5799, 123, 7, 1),
                    ))
                }
                0x1C => {
                    assert_eq!(&payload[0..2], &7u16.to_le_bytes());
                    assert_eq!(&payload[2..4], &1u16.to_le_bytes());
                    assert_eq!(payload[4], 0x3F);
                    assert_eq!(&payload[5..16], b"*       TXT");
                    Some(reply_frame(
                        req,
                        0,
                        &find_reply(0x20, b"BFILE   TXT", 0x6021, 0x5799, 456, 7, 2),
                    ))
                }
                other => panic!("unexpected op {other:#04x}"),
            }
        },
        f_to_c(),
    );

    let cds = cds_with_path(b"F:\\");
    let mut cursor = [0u8; SEARCH_BLOCK_LEN];
    let mut found = [0u8; FOUND_FILE_LEN];
    unwrap_regs(session.redirector().dispatch(HostCall::FindFirst {
        cursor: &mut cursor,
        found: &mut found,
        path: b"F:\\*.TXT",
        attr: 0x3F,
        cds: &cds,
    }));
    {
        let sdb = SearchBlock::view(&cursor).unwrap();
        assert_eq!(sdb.drive, 0x80 | 5);
        assert_eq!(&sdb.template, b"*       TXT");
        assert_eq!(sdb.attr_mask, 0x3F);
        assert_eq!(sdb.dir_entry.get(), 1);
        assert_eq!(sdb.parent.get(), 7);
        let entry = FoundFile::view_mut(&mut found).unwrap();
        assert_eq!(&entry.name, b"AFILE   TXT");
        assert_eq!(entry.attr, 0x20);
        assert_eq!(entry.time.get(), 0x6021);
        assert_eq!(entry.date.get(), 0x5799);
        assert_eq!(entry.size.get(), 123);
    }

    unwrap_regs(session.redirector().dispatch(HostCall::FindNext {
        cursor: &mut cursor,
        found: &mut found,
    }));
    let sdb = SearchBlock::view(&cursor).unwrap();
    assert_eq!(sdb.dir_entry.get(), 2);
    let entry = FoundFile::view_mut(&mut found).unwrap();
    assert_eq!(&entry.name, b"BFILE   TXT");
    assert_eq!(entry.size.get(), 456);
}

#[test]
fn seek_from_end_reports_the_absolute_position() {
    let (mut session, _) = serve(
        |req| {
            assert_eq!(req[59], 0x21);
            let payload = payload_of(req);
            assert_eq!(&payload[0..4], &(-10i32).to_le_bytes());
            assert_eq!(&payload[4..6], &0x0101u16.to_le_bytes());
            Some(reply_frame(req, 0, &90u32.to_le_bytes()))
        },
        f_to_c(),
    );
    let sft = remote_file_sft(0x0101, 42, 100);
    let regs = unwrap_regs(session.redirector().dispatch(HostCall::SeekFromEnd {
        sft: &sft,
        offset: -10,
    }));
    assert_eq!(regs.ax, 90);
    assert_eq!(regs.dx, 0);
    // The engine reports the position but leaves the entry to the host.
    assert_eq!(Sft::view(&sft).unwrap().file_pos.get(), 42);
}

#[test]
fn removing_the_working_directory_fails_locally() {
    let (mut session, server) = serve(
        |req| {
            assert_eq!(req[59], 0x01);
            assert_eq!(payload_of(req), b"\\OTHER");
            Some(reply_frame(req, 0, &[]))
        },
        f_to_c(),
    );
    let cds = cds_with_path(b"F:\\DIR");
    let err = unwrap_err(session.redirector().dispatch(HostCall::RemoveDir {
        path: b"F:\\DIR",
        cds: &cds,
    }));
    assert_eq!(err, DosError::CURRENT_DIRECTORY);
    assert_eq!(server.request_count(), 0);

    unwrap_regs(session.redirector().dispatch(HostCall::RemoveDir {
        path: b"F:\\OTHER",
        cds: &cds,
    }));
    assert_eq!(server.request_count(), 1);
}

#[test]
fn peer_errors_surface_verbatim() {
    let (mut session, _) = serve(|req| Some(reply_frame(req, 5, &[])), f_to_c());
    let err = unwrap_err(
        session
            .redirector()
            .dispatch(HostCall::MakeDir { path: b"F:\\NEW" }),
    );
    assert_eq!(err, DosError::ACCESS_DENIED);
}

#[test]
fn record_locks_marshal_count_and_ranges() {
    let (mut session, server) = serve(
        |req| {
            assert_eq!(req[59], 0x0B); // unlock
            let payload = payload_of(req);
            assert_eq!(&payload[0..2], &1u16.to_le_bytes());
            assert_eq!(&payload[2..4], &0x0101u16.to_le_bytes());
            assert_eq!(payload.len(), 4 + 8);
            Some(reply_frame(req, 0, &[]))
        },
        f_to_c(),
    );
    let sft = remote_file_sft(0x0101, 0, 0);
    let mut record = [0u8; 8];
    record[0..4].copy_from_slice(&16u32.to_le_bytes()); // start
    record[4..8].copy_from_slice(&4u32.to_le_bytes()); // length
    unwrap_regs(session.redirector().dispatch(HostCall::Lock {
        sft: &sft,
        function: 1,
        records: &record,
    }));
    assert_eq!(server.request_count(), 1);

    let err = unwrap_err(session.redirector().dispatch(HostCall::Lock {
        sft: &sft,
        function: 2,
        records: &record,
    }));
    assert_eq!(err, DosError::FILE_NOT_FOUND);
    assert_eq!(server.request_count(), 1, "bad subfunction stays local");
}

#[test]
fn commit_succeeds_without_wire_traffic() {
    let (mut session, server) = serve(|_| panic!("no wire traffic expected"), f_to_c());
    let sft = remote_file_sft(0x0101, 0, 0);
    unwrap_regs(session.redirector().dispatch(HostCall::Commit { sft: &sft }));
    assert_eq!(server.request_count(), 0);
}

#[test]
fn get_attr_maps_the_reply_into_registers() {
    let (mut session, _) = serve(
        |req| {
            assert_eq!(req[59], 0x0F);
            let mut payload = [0u8; 9];
            payload[0..2].copy_from_slice(&0x6021u16.to_le_bytes()); // time
            payload[2..4].copy_from_slice(&0x5799u16.to_le_bytes()); // date
            payload[4..8].copy_from_slice(&0x0001_0005u32.to_le_bytes()); // size
            payload[8] = 0x20; // attr
            Some(reply_frame(req, 0, &payload))
        },
        f_to_c(),
    );
    let regs = unwrap_regs(
        session
            .redirector()
            .dispatch(HostCall::GetAttr { path: b"F:\\X.TXT" }),
    );
    assert_eq!(regs.ax, 0x20);
    assert_eq!(regs.cx, 0x6021);
    assert_eq!(regs.dx, 0x5799);
    assert_eq!(regs.bx, 1, "size high word");
    assert_eq!(regs.di, 5, "size low word");
}

#[test]
fn extended_open_returns_the_action_taken() {
    let (mut session, _) = serve(
        |req| {
            assert_eq!(req[59], 0x2E);
            let payload = payload_of(req);
            assert_eq!(&payload[0..2], &0x0020u16.to_le_bytes()); // attr word
            assert_eq!(&payload[2..4], &0x0011u16.to_le_bytes()); // action
            assert_eq!(&payload[4..6], &0x0042u16.to_le_bytes()); // mode
            Some(reply_frame(
                req,
                0,
                &open_reply(0x20, b"NEW     DAT", 0, 0, 0x0202, 0x0002),
            ))
        },
        f_to_c(),
    );
    let mut sft = [0u8; SFT_LEN];
    let regs = unwrap_regs(session.redirector().dispatch(HostCall::ExtendedOpen {
        sft: &mut sft,
        path: b"F:\\NEW.DAT",
        stack_word: 0x0020,
        action: 0x0011,
        mode: 0x0042,
    }));
    assert_eq!(regs.cx, 0x0002, "result word from reply offset 22");
    assert_eq!(Sft::view(&sft).unwrap().fileid.get(), 0x0202);
}
