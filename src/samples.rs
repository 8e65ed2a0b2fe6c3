//! Canned messages in every supported dialect.
//!
//! Used by the `send-samples` simulator to exercise a running relay end to
//! end, and by the benchmarks.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::contact::Dialect;
use crate::relay::resolve;

/// Source port the simulator sends from by default (WSJT-X's).
pub const DEFAULT_SOURCE_PORT: u16 = 2237;

/// A sample message and what the relay should make of it.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// Short description.
    pub name: &'static str,

    /// Dialect the detector assigns.
    pub dialect: Dialect,

    /// Callsign the parser extracts.
    pub callsign: &'static str,

    /// The raw message.
    pub payload: &'static str,
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "WSJT-X ADIF log upload",
        dialect: Dialect::Wsjtx,
        callsign: "VK1ABC",
        payload: "<call:6>VK1ABC<band:3>20m<mode:3>FT8<rst_sent:3>-05<rst_rcvd:3>-12<qso_date:8>20231012<time_on:6>123000<eor>",
    },
    Sample {
        name: "VarAC JSON broadcast",
        dialect: Dialect::VarAc,
        callsign: "W1ABC",
        payload: r#"{"app":"VarAC","call":"W1ABC","freq":"14.105","mode":"VARA HF","timestamp":"2023-10-12 14:30:00","rst_sent":"599","rst_rcvd":"599","band":"20m"}"#,
    },
    Sample {
        name: "VarAC minimal JSON",
        dialect: Dialect::VarAc,
        callsign: "JA1DEF",
        payload: r#"{"call":"JA1DEF","frequency":"21.105","mode":"VARA"}"#,
    },
    Sample {
        name: "VarAC VARA FM JSON",
        dialect: Dialect::VarAc,
        callsign: "VK3ABC",
        payload: r#"{"app":"VarAC","call":"VK3ABC","freq":"145.500","mode":"VARA FM","band":"2m"}"#,
    },
    Sample {
        name: "VarAC completion text",
        dialect: Dialect::VarAc,
        callsign: "EA1ABC",
        payload: "VarAC QSO completed with EA1ABC",
    },
    Sample {
        name: "VarAC status text",
        dialect: Dialect::VarAc,
        callsign: "VK2XYZ",
        payload: "VarAC: QSO with VK2XYZ on 7.105 VARA HF",
    },
    Sample {
        name: "VarAC ADIF export",
        dialect: Dialect::VarAc,
        callsign: "DL1ABC",
        payload: "<CALL:6>DL1ABC<MODE:7>VARA HF<FREQ:6>14.105<QSO_DATE:8>20231012<TIME_ON:6>151500<EOR>",
    },
    Sample {
        name: "N1MM contactinfo",
        dialect: Dialect::N1mm,
        callsign: "WB4WOJ",
        payload: r#"<contactinfo app="N1MM Logger Plus" timestamp="2025-11-19 01:36:37"><call>WB4WOJ</call><mode>CW</mode><band>14</band></contactinfo>"#,
    },
    Sample {
        name: "Fldigi log line",
        dialect: Dialect::Fldigi,
        callsign: "K1ABC",
        payload: "fldigi: QSO K1ABC 7.070 MHz PSK31 599",
    },
    Sample {
        name: "JS8Call heard station",
        dialect: Dialect::Js8Call,
        callsign: "KN4CRD",
        payload: "JS8Call: KN4CRD heard on 14.078 MHz",
    },
    Sample {
        name: "Free-form text",
        dialect: Dialect::Generic,
        callsign: "VK1ABC",
        payload: "QSO with VK1ABC on 14.074 MHz FT8 mode",
    },
];

/// Send `count` samples to `target`, cycling through [`SAMPLES`], one every
/// `interval`. A `count` of zero sends until cancelled.
///
/// The socket is bound to `source_port` so the relay's source filter lets
/// the datagrams through. Returns the number of datagrams sent.
pub async fn send_samples(
    target: &str,
    source_port: u16,
    interval: Duration,
    count: usize,
    cancel: CancellationToken,
) -> Result<usize> {
    let target = resolve(target).await?;
    let local: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], source_port).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, source_port).into()
    };
    let socket = UdpSocket::bind(local)
        .await
        .with_context(|| format!("Failed to bind simulator socket on port {}", source_port))?;

    let mut sent = 0;
    for sample in SAMPLES.iter().cycle() {
        if count > 0 && sent >= count {
            break;
        }
        if sent > 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        } else if cancel.is_cancelled() {
            break;
        }

        socket
            .send_to(sample.payload.as_bytes(), target)
            .await
            .with_context(|| format!("Failed to send sample to {}", target))?;
        sent += 1;
        info!("Sent {} ({}) to {}", sample.name, sample.callsign, target);
    }

    Ok(sent)
}
