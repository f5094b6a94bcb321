//! A minimal RESP2 client, enough to drive a Redis-compatible server as a backing store.
//!
//! Only the commands the simulation needs are spoken: `SELECT`, `PING`, `GET`, `SET`, `DEL` and
//! `FLUSHDB`. Requests are encoded as arrays of bulk strings and every call waits for its reply.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;
use tracing::debug;
use crate::config::StoreAddress;
use crate::error::{Error, Result};
use crate::record::RecordId;
use crate::store::BackingStore;

/// Maximum bulk string size: 512MB (matches the RESP protocol limit).
const MAX_BULK_STRING_LEN: usize = 512 * 1024 * 1024;

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

/// Encodes a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

fn protocol_error(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
    }
    match line.strip_suffix("\r\n") {
        Some(stripped) => Ok(stripped.to_owned()),
        None => Err(protocol_error(format!("unterminated line {line:?}"))),
    }
}

fn parse_length(text: &str) -> io::Result<Option<usize>> {
    let length: i64 = text.parse().map_err(|_| protocol_error(format!("bad length {text:?}")))?;
    if length < 0 {
        return Ok(None);
    }
    Ok(Some(length as usize))
}

/// Reads one complete reply.
pub fn read_reply<R: BufRead>(reader: &mut R) -> io::Result<Reply> {
    let line = read_line(reader)?;
    let (marker, rest) = line.split_at(line.len().min(1));
    match marker {
        "+" => Ok(Reply::Simple(rest.to_owned())),
        "-" => Ok(Reply::Error(rest.to_owned())),
        ":" => rest
            .parse()
            .map(Reply::Integer)
            .map_err(|_| protocol_error(format!("bad integer {rest:?}"))),
        "$" => match parse_length(rest)? {
            None => Ok(Reply::Bulk(None)),
            Some(len) if len > MAX_BULK_STRING_LEN => Err(protocol_error(format!("bulk string of {len} bytes"))),
            Some(len) => {
                let mut buf = vec![0u8; len + 2];
                reader.read_exact(&mut buf)?;
                if !buf.ends_with(b"\r\n") {
                    return Err(protocol_error("bulk string not terminated"));
                }
                buf.truncate(len);
                Ok(Reply::Bulk(Some(buf)))
            }
        },
        "*" => match parse_length(rest)? {
            None => Ok(Reply::Array(None)),
            Some(len) => {
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(read_reply(reader)?);
                }
                Ok(Reply::Array(Some(items)))
            }
        },
        _ => Err(protocol_error(format!("unknown reply type {line:?}"))),
    }
}

fn unavailable(address: &StoreAddress, e: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{}:{}: {e}", address.host, address.port))
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// A backing store on a Redis-compatible server.
///
/// `flush_all` issues `FLUSHDB`, so only the configured logical database is cleared. Give
/// concurrent benchmarks separate databases.
pub struct RespStore {
    address: StoreAddress,
    connection: Option<Connection>,
}

impl RespStore {
    pub fn new(address: StoreAddress) -> Self {
        Self {
            address,
            connection: None,
        }
    }

    pub fn address(&self) -> &StoreAddress {
        &self.address
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> Error {
        unavailable(&self.address, e)
    }

    fn call(&mut self, args: &[&[u8]]) -> Result<Reply> {
        let request = encode_command(args);
        let Self { address, connection } = self;
        let connection = connection.as_mut().ok_or_else(|| unavailable(address, "not connected"))?;
        let result = connection
            .writer
            .write_all(&request)
            .and_then(|_| connection.writer.flush())
            .and_then(|_| read_reply(&mut connection.reader));
        match result {
            Ok(Reply::Error(message)) => Err(self.unavailable(message)),
            Ok(reply) => Ok(reply),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn expect_ok(&mut self, args: &[&[u8]]) -> Result<()> {
        match self.call(args)? {
            Reply::Simple(_) => Ok(()),
            other => Err(self.unavailable(format!("unexpected reply {other:?}"))),
        }
    }
}

impl BackingStore for RespStore {
    fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect((self.address.host.as_str(), self.address.port))
            .map_err(|e| self.unavailable(e))?;
        stream.set_nodelay(true).map_err(|e| self.unavailable(e))?;
        let reader = BufReader::new(stream.try_clone().map_err(|e| self.unavailable(e))?);
        self.connection = Some(Connection {
            reader,
            writer: BufWriter::new(stream),
        });
        if self.address.database != 0 {
            let database = self.address.database.to_string();
            self.expect_ok(&[b"SELECT", database.as_bytes()])?;
        }
        self.expect_ok(&[b"PING"])?;
        debug!(host = %self.address.host, port = self.address.port, database = self.address.database, "connected to backing store");
        Ok(())
    }

    fn get(&mut self, key: RecordId) -> Result<Option<String>> {
        let key = key.to_string();
        match self.call(&[b"GET", key.as_bytes()])? {
            Reply::Bulk(None) => Ok(None),
            Reply::Bulk(Some(bytes)) => String::from_utf8(bytes).map(Some).map_err(|e| self.unavailable(e)),
            other => Err(self.unavailable(format!("unexpected reply {other:?}"))),
        }
    }

    fn set(&mut self, key: RecordId, payload: &str) -> Result<()> {
        let key = key.to_string();
        self.expect_ok(&[b"SET", key.as_bytes(), payload.as_bytes()])
    }

    fn del(&mut self, key: RecordId) -> Result<()> {
        let key = key.to_string();
        match self.call(&[b"DEL", key.as_bytes()])? {
            Reply::Integer(_) => Ok(()),
            other => Err(self.unavailable(format!("unexpected reply {other:?}"))),
        }
    }

    fn flush_all(&mut self) -> Result<()> {
        self.expect_ok(&[b"FLUSHDB"])
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            let _ = connection.reader.get_ref().shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;
    use crate::config::{DistributionKind, PolicyKind, SimulationConfig};
    use crate::simulator::Simulator;
    use crate::test::sequence;

    #[test]
    fn test_encode_get() {
        assert_eq!(encode_command(&[b"GET", b"mykey"]), b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
    }

    #[test]
    fn test_encode_set() {
        assert_eq!(
            encode_command(&[b"SET", b"mykey", b"myvalue"]),
            b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n"
        );
    }

    #[test]
    fn test_decode_simple_string() {
        let mut input = Cursor::new(&b"+OK\r\n"[..]);
        assert_eq!(read_reply(&mut input).unwrap(), Reply::Simple("OK".into()));
    }

    #[test]
    fn test_decode_bulk_and_null() {
        let mut input = Cursor::new(&b"$5\r\nhello\r\n$-1\r\n"[..]);
        assert_eq!(read_reply(&mut input).unwrap(), Reply::Bulk(Some(b"hello".to_vec())));
        assert_eq!(read_reply(&mut input).unwrap(), Reply::Bulk(None));
    }

    #[test]
    fn test_decode_bulk_with_crlf_inside() {
        let mut input = Cursor::new(&b"$4\r\na\r\nb\r\n"[..]);
        assert_eq!(read_reply(&mut input).unwrap(), Reply::Bulk(Some(b"a\r\nb".to_vec())));
    }

    #[test]
    fn test_decode_integer_error_and_array() {
        let mut input = Cursor::new(&b":1\r\n-ERR unknown\r\n*2\r\n+a\r\n:2\r\n"[..]);
        assert_eq!(read_reply(&mut input).unwrap(), Reply::Integer(1));
        assert_eq!(read_reply(&mut input).unwrap(), Reply::Error("ERR unknown".into()));
        assert_eq!(
            read_reply(&mut input).unwrap(),
            Reply::Array(Some(vec![Reply::Simple("a".into()), Reply::Integer(2)]))
        );
    }

    #[test]
    fn test_decode_truncated() {
        let mut input = Cursor::new(&b"$5\r\nhel"[..]);
        assert!(read_reply(&mut input).is_err());
    }

    fn encode_reply(reply: &Reply) -> Vec<u8> {
        match reply {
            Reply::Simple(text) => format!("+{text}\r\n").into_bytes(),
            Reply::Error(text) => format!("-{text}\r\n").into_bytes(),
            Reply::Integer(value) => format!(":{value}\r\n").into_bytes(),
            Reply::Bulk(None) => b"$-1\r\n".to_vec(),
            Reply::Bulk(Some(bytes)) => {
                let mut out = format!("${}\r\n", bytes.len()).into_bytes();
                out.extend_from_slice(bytes);
                out.extend_from_slice(b"\r\n");
                out
            }
            Reply::Array(_) => unimplemented!("the store never receives arrays"),
        }
    }

    /// A single threaded server keeping one map per logical database
    ///
    /// Serves `connections` clients one after the other, then returns every command it saw and
    /// what was left in each database
    fn serve(listener: TcpListener, connections: usize) -> (Vec<Vec<String>>, HashMap<u32, HashMap<Vec<u8>, Vec<u8>>>) {
        let mut log = Vec::new();
        let mut databases: HashMap<u32, HashMap<Vec<u8>, Vec<u8>>> = HashMap::new();
        for stream in listener.incoming().take(connections) {
            let stream = stream.unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut selected = 0;
            // The client hangs up by shutting the socket down
            while let Ok(Reply::Array(Some(items))) = read_reply(&mut reader) {
                let args: Vec<Vec<u8>> = items
                    .into_iter()
                    .map(|item| match item {
                        Reply::Bulk(Some(bytes)) => bytes,
                        other => panic!("unexpected argument {other:?}"),
                    })
                    .collect();
                log.push(args.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect::<Vec<_>>());
                let db = databases.entry(selected).or_default();
                let reply = match args[0].as_slice() {
                    b"SELECT" => {
                        selected = String::from_utf8_lossy(&args[1]).parse().unwrap();
                        Reply::Simple("OK".into())
                    }
                    b"PING" => Reply::Simple("PONG".into()),
                    b"GET" => Reply::Bulk(db.get(&args[1]).cloned()),
                    b"SET" => {
                        db.insert(args[1].clone(), args[2].clone());
                        Reply::Simple("OK".into())
                    }
                    b"DEL" => Reply::Integer(db.remove(&args[1]).is_some() as i64),
                    b"FLUSHDB" => {
                        db.clear();
                        Reply::Simple("OK".into())
                    }
                    _ => Reply::Error("ERR unknown command".into()),
                };
                writer.write_all(&encode_reply(&reply)).unwrap();
            }
        }
        (log, databases)
    }

    #[test]
    fn test_simulations_against_a_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || serve(listener, 2));
        let mut store = RespStore::new(StoreAddress { host: "127.0.0.1".into(), port, database: 2 });

        let config = SimulationConfig { max_keys: 3, seed: Some(1), shuffle: false };
        let mut lru = Simulator::new(PolicyKind::LeastRecentlyUsed, DistributionKind::LongTail, &config).unwrap();
        let result = lru.simulate(sequence(&[1, 2, 1, 3, 1]), &mut store).unwrap().clone();
        assert_eq!((result.hits, result.misses), (2, 3));

        let config = SimulationConfig { max_keys: 2, ..config };
        let mut random = Simulator::new(PolicyKind::UniformRandom, DistributionKind::Even, &config).unwrap();
        let result = random.simulate(sequence(&[1, 2, 3, 1]), &mut store).unwrap().clone();
        assert_eq!(result.final_cache_size, 2);
        assert!(result.evictions >= 1);

        let (log, databases) = server.join().unwrap();
        let names: Vec<&str> = log.iter().map(|args| args[0].as_str()).collect();
        // Each connection selects its database, checks liveness and starts from an empty store
        assert_eq!(&names[..3], ["SELECT", "PING", "FLUSHDB"]);
        assert_eq!(log[0], ["SELECT", "2"]);
        assert_eq!(names.iter().filter(|&&name| name == "SELECT").count(), 2);
        assert_eq!(names.iter().filter(|&&name| name == "FLUSHDB").count(), 4);
        assert!(names.contains(&"DEL"));
        assert!(log.iter().any(|args| args[0] == "SET" && args[2].contains("\"street\"")));
        // Nothing touched the default database, and the runs cleaned up after themselves
        assert!(databases.get(&0).map_or(true, |db| db.is_empty()));
        assert!(databases[&2].is_empty());
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            read_reply(&mut reader).unwrap();
            writer.write_all(b"-NOAUTH Authentication required.\r\n").unwrap();
        });
        let mut store = RespStore::new(StoreAddress { host: "127.0.0.1".into(), port, database: 0 });
        assert!(matches!(store.connect(), Err(Error::StoreUnavailable(message)) if message.contains("NOAUTH")));
        server.join().unwrap();
    }

    #[test]
    fn test_unconnected_store_is_unavailable() {
        let mut store = RespStore::new(StoreAddress { host: "localhost".into(), port: 6379, database: 0 });
        assert!(matches!(store.get(RecordId(1)), Err(Error::StoreUnavailable(_))));
    }
}
