//! Session description text format
//!
//! Only the lines a two-party audio call needs are modelled. Unknown lines
//! are skipped on parse.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use voxcall_rtp_core::SdesCryptoAttribute;

use crate::errors::NegotiationError;

/// `a=rtpmap:<pt> <encoding>/<clock rate>[/<channels>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub payload_type: u8,
    pub encoding: String,
    pub clock_rate: u32,
    pub channels: Option<u8>,
}

impl RtpMap {
    /// Static assignments from RFC 3551 that need no rtpmap line
    pub fn static_payload(payload_type: u8) -> Option<Self> {
        let encoding = match payload_type {
            0 => "PCMU",
            8 => "PCMA",
            _ => return None,
        };
        Some(Self {
            payload_type,
            encoding: encoding.to_string(),
            clock_rate: 8000,
            channels: None,
        })
    }

    fn parse(value: &str) -> Result<Self, NegotiationError> {
        let (pt, format) = value
            .split_once(' ')
            .ok_or_else(|| malformed("rtpmap", value))?;
        let mut parts = format.trim().split('/');

        let encoding = parts.next().filter(|e| !e.is_empty()).ok_or_else(|| malformed("rtpmap", value))?;
        let clock_rate = parts
            .next()
            .and_then(|r| r.parse().ok())
            .ok_or_else(|| malformed("rtpmap", value))?;
        let channels = match parts.next() {
            Some(c) => Some(c.parse().map_err(|_| malformed("rtpmap", value))?),
            None => None,
        };

        Ok(Self {
            payload_type: pt.trim().parse().map_err(|_| malformed("rtpmap", value))?,
            encoding: encoding.to_string(),
            clock_rate,
            channels,
        })
    }
}

/// `o=` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub version: u64,
    pub address: IpAddr,
}

/// One `m=` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub media: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<u8>,
    pub connection: Option<IpAddr>,
    pub rtpmaps: Vec<RtpMap>,
    pub crypto: Vec<SdesCryptoAttribute>,
    pub direction: Option<String>,
}

impl MediaDescription {
    pub fn audio(port: u16, protocol: &str) -> Self {
        Self {
            media: "audio".to_string(),
            port,
            protocol: protocol.to_string(),
            formats: Vec::new(),
            connection: None,
            rtpmaps: Vec::new(),
            crypto: Vec::new(),
            direction: Some("sendrecv".to_string()),
        }
    }

    /// The rtpmap for `payload_type`, falling back to the static table
    pub fn rtpmap(&self, payload_type: u8) -> Option<RtpMap> {
        self.rtpmaps
            .iter()
            .find(|m| m.payload_type == payload_type)
            .cloned()
            .or_else(|| RtpMap::static_payload(payload_type))
    }
}

/// A parsed session description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub origin: Origin,
    pub session_name: String,
    pub connection: Option<IpAddr>,
    pub media: Vec<MediaDescription>,
}

impl SessionDescription {
    /// The first audio section
    pub fn audio(&self) -> Option<&MediaDescription> {
        self.media.iter().find(|m| m.media == "audio")
    }

    /// Connection address for `media`, falling back to the session level
    pub fn connection_for(&self, media: &MediaDescription) -> Option<IpAddr> {
        media.connection.or(self.connection)
    }

    pub fn parse(text: &str) -> Result<Self, NegotiationError> {
        let mut origin = None;
        let mut session_name = String::new();
        let mut connection = None;
        let mut media: Vec<MediaDescription> = Vec::new();

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (kind, value) = line.split_once('=').ok_or_else(|| malformed("line", line))?;

            match kind {
                "v" if value != "0" => return Err(malformed("version", value)),
                "o" => origin = Some(parse_origin(value)?),
                "s" => session_name = value.to_string(),
                "c" => {
                    let addr = parse_connection(value)?;
                    match media.last_mut() {
                        Some(m) => m.connection = Some(addr),
                        None => connection = Some(addr),
                    }
                }
                "m" => media.push(parse_media(value)?),
                "a" => {
                    if let Some(m) = media.last_mut() {
                        parse_attribute(m, value)?;
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            origin: origin.ok_or_else(|| malformed("origin", "missing o= line"))?,
            session_name,
            connection,
            media,
        })
    }
}

impl FromStr for SessionDescription {
    type Err = NegotiationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn malformed(what: &str, value: &str) -> NegotiationError {
    NegotiationError::Malformed(format!("bad {}: {}", what, value))
}

fn parse_origin(value: &str) -> Result<Origin, NegotiationError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 6 || fields[3] != "IN" {
        return Err(malformed("origin", value));
    }
    Ok(Origin {
        username: fields[0].to_string(),
        session_id: fields[1].parse().map_err(|_| malformed("origin", value))?,
        version: fields[2].parse().map_err(|_| malformed("origin", value))?,
        address: fields[5].parse().map_err(|_| malformed("origin", value))?,
    })
}

fn parse_connection(value: &str) -> Result<IpAddr, NegotiationError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 3 || fields[0] != "IN" {
        return Err(malformed("connection", value));
    }
    // Multicast TTL suffixes are not used for calls
    let addr = fields[2].split('/').next().unwrap_or_default();
    let parsed: IpAddr = addr.parse().map_err(|_| malformed("connection", value))?;
    match (fields[1], parsed) {
        ("IP4", IpAddr::V4(_)) | ("IP6", IpAddr::V6(_)) => Ok(parsed),
        _ => Err(malformed("connection", value)),
    }
}

fn parse_media(value: &str) -> Result<MediaDescription, NegotiationError> {
    let mut fields = value.split_whitespace();
    let kind = fields.next().ok_or_else(|| malformed("media", value))?;
    let port = fields
        .next()
        .and_then(|p| p.split('/').next())
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| malformed("media", value))?;
    let protocol = fields.next().ok_or_else(|| malformed("media", value))?;

    let mut media = MediaDescription::audio(port, protocol);
    media.media = kind.to_string();
    media.direction = None;
    // Non-numeric formats belong to non-RTP media and are skipped
    media.formats = fields.filter_map(|f| f.parse().ok()).collect();
    Ok(media)
}

fn parse_attribute(media: &mut MediaDescription, value: &str) -> Result<(), NegotiationError> {
    let (name, rest) = value.split_once(':').unwrap_or((value, ""));
    match name {
        "rtpmap" => media.rtpmaps.push(RtpMap::parse(rest)?),
        "crypto" => {
            let attribute =
                SdesCryptoAttribute::parse(rest).map_err(|e| NegotiationError::Malformed(e.to_string()))?;
            media.crypto.push(attribute);
        }
        "sendrecv" | "sendonly" | "recvonly" | "inactive" => media.direction = Some(name.to_string()),
        _ => {}
    }
    Ok(())
}

fn address_type(addr: &IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(_) => "IP4",
        IpAddr::V6(_) => "IP6",
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v=0\r\n")?;
        write!(
            f,
            "o={} {} {} IN {} {}\r\n",
            self.origin.username,
            self.origin.session_id,
            self.origin.version,
            address_type(&self.origin.address),
            self.origin.address
        )?;
        write!(f, "s={}\r\n", self.session_name)?;
        if let Some(addr) = &self.connection {
            write!(f, "c=IN {} {}\r\n", address_type(addr), addr)?;
        }
        write!(f, "t=0 0\r\n")?;

        for media in &self.media {
            write!(f, "m={} {} {}", media.media, media.port, media.protocol)?;
            for format in &media.formats {
                write!(f, " {}", format)?;
            }
            write!(f, "\r\n")?;
            if let Some(addr) = &media.connection {
                write!(f, "c=IN {} {}\r\n", address_type(addr), addr)?;
            }
            for map in &media.rtpmaps {
                write!(f, "a=rtpmap:{} {}/{}", map.payload_type, map.encoding, map.clock_rate)?;
                if let Some(channels) = map.channels {
                    write!(f, "/{}", channels)?;
                }
                write!(f, "\r\n")?;
            }
            for crypto in &media.crypto {
                write!(f, "a=crypto:{}\r\n", crypto)?;
            }
            if let Some(direction) = &media.direction {
                write!(f, "a={}\r\n", direction)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTE: &str = "v=0\r\n\
        o=bob 2890844527 2890844527 IN IP4 192.0.2.10\r\n\
        s=-\r\n\
        c=IN IP4 192.0.2.10\r\n\
        t=0 0\r\n\
        m=audio 49170 RTP/SAVP 111 0 101\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=rtpmap:101 telephone-event/8000\r\n\
        a=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:WVNfX19zZW1jdGwgKCkgewkyMjA7fQp9CnVubGVz|2^20|1:32\r\n\
        a=ptime:20\r\n\
        a=sendrecv\r\n";

    #[test]
    fn test_parse_remote_offer() {
        let sdp = SessionDescription::parse(REMOTE).unwrap();
        assert_eq!(sdp.origin.session_id, 2890844527);
        assert_eq!(sdp.connection, Some("192.0.2.10".parse().unwrap()));

        let audio = sdp.audio().unwrap();
        assert_eq!(audio.port, 49170);
        assert_eq!(audio.protocol, "RTP/SAVP");
        assert_eq!(audio.formats, vec![111, 0, 101]);
        assert_eq!(audio.rtpmap(111).unwrap().channels, Some(2));
        assert_eq!(audio.rtpmap(0).unwrap().encoding, "PCMU");
        assert!(audio.rtpmap(96).is_none());
        assert_eq!(audio.crypto.len(), 1);
        assert_eq!(audio.crypto[0].key_material(), "WVNfX19zZW1jdGwgKCkgewkyMjA7fQp9CnVubGVz");
        assert_eq!(audio.direction.as_deref(), Some("sendrecv"));
    }

    #[test]
    fn test_media_level_connection_overrides_session() {
        let text = "v=0\no=- 1 1 IN IP4 10.0.0.1\ns=x\nc=IN IP4 10.0.0.1\nt=0 0\n\
                    m=audio 4000 RTP/AVP 0\nc=IN IP6 2001:db8::1\n";
        let sdp = SessionDescription::parse(text).unwrap();
        let audio = sdp.audio().unwrap();
        assert_eq!(sdp.connection_for(audio), Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_display_parses_back() {
        let sdp = SessionDescription::parse(REMOTE).unwrap();
        let text = sdp.to_string();
        assert!(text.starts_with("v=0\r\no=bob 2890844527 2890844527 IN IP4 192.0.2.10\r\n"));
        assert!(text.contains("a=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:"));
        assert_eq!(SessionDescription::parse(&text).unwrap(), sdp);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(SessionDescription::parse("v=1\n"), Err(NegotiationError::Malformed(_))));
        assert!(SessionDescription::parse("v=0\ns=x\n").is_err());
        assert!(SessionDescription::parse("v=0\no=- 1 1 IN IP4 10.0.0.1\nc=IN IP4 nowhere\n").is_err());
        assert!(SessionDescription::parse("v=0\no=- 1 1 IN IP4 10.0.0.1\nm=audio port RTP/AVP 0\n").is_err());
        assert!(SessionDescription::parse("garbage").is_err());
    }
}
