use colored::*;
use dot15d4_csma::csma::{CsmaCa, CsmaConfig, Verdict};
use dot15d4_csma::mac::{PendingFrame, Superframe};
use dot15d4_csma::phy::{CcaStatus, PhyOption, SymbolRate};
use dot15d4_csma::sim::{ChannelModel, SimMac, SimPhy, Simulation, TraceKind};
use dot15d4_csma::time::Instant;
use dot15d4_csma::Error;
use rand::RngCore;

struct Writer<'b> {
    buffer: &'b mut String,
    indent: usize,
}

impl<'b> Writer<'b> {
    fn new(buffer: &'b mut String) -> Self {
        Self { buffer, indent: 0 }
    }

    fn increase_indent(&mut self) {
        self.indent += 2;
    }

    fn decrease_indent(&mut self) {
        self.indent -= 2;
    }

    fn write(&mut self, s: String) {
        self.buffer.push_str(&" ".repeat(self.indent));
        self.buffer.push_str(&s);
    }

    fn writeln(&mut self, s: String) {
        self.write(s);
        self.buffer.push('\n');
    }
}

/// Everything needed to replay a sequence of channel access attempts.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: CsmaConfig,
    pub phy: PhyOption,
    pub mpdu_octets: u32,
    pub ack_required: bool,
    pub to_coordinator: bool,
    /// Superframe of the first attempt, used in both directions.
    pub superframe: Superframe,
    /// Time of the first attempt.
    pub start: Instant,
    pub channel: ChannelModel,
    pub attempts: usize,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            config: CsmaConfig::default(),
            phy: PhyOption::default(),
            mpdu_octets: 20,
            ack_required: false,
            to_coordinator: false,
            superframe: Superframe::new(Instant::ZERO, 3, 15),
            start: Instant::ZERO,
            channel: ChannelModel::Idle,
            attempts: 1,
        }
    }
}

impl Scenario {
    fn frame(&self) -> PendingFrame {
        PendingFrame::for_mpdu(
            self.phy,
            self.mpdu_octets,
            self.ack_required,
            self.to_coordinator,
        )
    }
}

pub struct Report {}

impl Report {
    /// Run every attempt of `scenario` and render the trace.
    pub fn run<Rng: RngCore>(scenario: &Scenario, rng: Rng) -> Result<String, Error> {
        let rate = SymbolRate::from(scenario.phy);
        let frame = scenario.frame();
        let engine = CsmaCa::new(scenario.config, rng)?;
        let mac = SimMac::new(scenario.phy, frame).with_superframe(scenario.superframe);
        let phy = SimPhy::new(scenario.phy, scenario.channel.clone());
        let mut sim = Simulation::new(engine, mac, phy);
        sim.advance_to(scenario.start);

        let mut buffer = String::new();
        let mut w = Writer::new(&mut buffer);

        // -----------------------------------------------------------------
        // Configuration
        // -----------------------------------------------------------------
        let config = &scenario.config;
        w.writeln("Configuration".underline().bold().to_string());
        w.increase_indent();
        w.writeln(format!("{}: {}", "mode".bold(), config.mode));
        w.writeln(format!("{}: {}", "macMinBE".bold(), config.min_be));
        w.writeln(format!("{}: {}", "macMaxBE".bold(), config.max_be));
        w.writeln(format!(
            "{}: {}",
            "macMaxCSMABackoffs".bold(),
            config.max_backoffs
        ));
        w.writeln(format!(
            "{}: {} symbols",
            "unit backoff period".bold(),
            config.unit_backoff_period
        ));
        w.writeln(format!(
            "{}: {}",
            "battery life extension".bold(),
            if config.battery_life_extension {
                "on"
            } else {
                "off"
            }
        ));
        w.writeln(format!(
            "{}: {:?} ({} symbols/s)",
            "phy".bold(),
            scenario.phy,
            rate.symbols_per_second()
        ));
        w.writeln(format!(
            "{}: {} octets, {} symbols{}",
            "frame".bold(),
            scenario.mpdu_octets,
            frame.symbols,
            if frame.ack_required {
                ", ack requested"
            } else {
                ""
            }
        ));
        if config.is_slotted() {
            let sf = &scenario.superframe;
            w.writeln(format!(
                "{}: SO {}, final CAP slot {}, beacon at {}",
                "superframe".bold(),
                sf.superframe_order,
                sf.final_cap_slot,
                sf.beacon_time
            ));
        }
        w.decrease_indent();

        // -----------------------------------------------------------------
        // Attempts
        // -----------------------------------------------------------------
        for attempt in 1..=scenario.attempts {
            let seen = sim.trace().len();

            sim.start()?;
            let verdict = sim.run_until_verdict()?.ok_or(Error::Stalled)?;

            w.writeln(format!("Attempt {attempt}").underline().bold().to_string());
            w.increase_indent();
            for event in &sim.trace()[seen..] {
                w.writeln(format!("{} {}", event.at.to_string().dimmed(), describe(&event.kind)));
            }
            w.decrease_indent();

            if verdict == Verdict::Deferred {
                // Resume with the following beacon.
                sim.mac.outgoing = sim.mac.outgoing.next(rate);
                sim.mac.incoming = sim.mac.incoming.next(rate);
                let beacon = sim.mac.outgoing.beacon_time.min(sim.mac.incoming.beacon_time);
                sim.advance_to(beacon);
            }
        }

        Ok(buffer)
    }
}

fn describe(kind: &TraceKind) -> String {
    match kind {
        TraceKind::Started { mode } => format!("started ({mode})"),
        TraceKind::CcaRequested {
            backoff_exponent,
            backoffs,
            contention_window,
        } => format!("CCA requested (BE {backoff_exponent}, NB {backoffs}, CW {contention_window})"),
        TraceKind::CcaResult(status) => match status {
            CcaStatus::Idle => "channel idle".green().to_string(),
            CcaStatus::Busy => "channel busy".yellow().to_string(),
            CcaStatus::TrxOff => "transceiver off".yellow().to_string(),
        },
        TraceKind::TransactionCost(symbols) => format!("transaction needs {symbols} symbols"),
        TraceKind::Verdict(verdict) => {
            let text = format!("verdict: {verdict}");
            match verdict {
                Verdict::ChannelIdle => text.bright_green().bold().to_string(),
                Verdict::ChannelAccessFailure => text.bright_red().bold().to_string(),
                Verdict::Deferred => text.bright_blue().bold().to_string(),
            }
        }
    }
}

/// Parse a `--channel` pattern of `i` and `b` characters.
pub fn parse_channel(pattern: &str) -> Result<ChannelModel, String> {
    ChannelModel::from_pattern(pattern)
        .map_err(|c| format!("unexpected '{c}', use 'i' for idle and 'b' for busy"))
}
