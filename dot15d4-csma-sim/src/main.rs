use clap::{Parser, ValueEnum};
use colored::*;
use dot15d4_csma::csma::{CsmaConfig, CsmaMode};
use dot15d4_csma::mac::Superframe;
use dot15d4_csma::phy::{PhyOption, MAX_PHY_PACKET_SIZE};
use dot15d4_csma::sim::ChannelModel;
use dot15d4_csma::time::Instant;
use dot15d4_csma_sim::{parse_channel, Report, Scenario};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Phy {
    Bpsk868,
    Bpsk915,
    Oqpsk868,
    Oqpsk915,
    Oqpsk2450,
}

impl From<Phy> for PhyOption {
    fn from(phy: Phy) -> Self {
        match phy {
            Phy::Bpsk868 => PhyOption::Bpsk868,
            Phy::Bpsk915 => PhyOption::Bpsk915,
            Phy::Oqpsk868 => PhyOption::Oqpsk868,
            Phy::Oqpsk915 => PhyOption::Oqpsk915,
            Phy::Oqpsk2450 => PhyOption::Oqpsk2450,
        }
    }
}

/// Simulate IEEE 802.15.4 CSMA-CA channel access.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Use slotted CSMA-CA (beacon-enabled PAN).
    #[arg(long)]
    slotted: bool,

    /// macMinBE
    #[arg(long, default_value_t = CsmaConfig::default().min_be)]
    min_be: u8,

    /// macMaxBE
    #[arg(long, default_value_t = CsmaConfig::default().max_be)]
    max_be: u8,

    /// macMaxCSMABackoffs
    #[arg(long, default_value_t = CsmaConfig::default().max_backoffs)]
    max_backoffs: u8,

    /// macBattLifeExt
    #[arg(long)]
    battery_life_extension: bool,

    #[arg(long, value_enum, default_value_t = Phy::Oqpsk2450)]
    phy: Phy,

    /// Length of the MPDU in octets.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(0..=MAX_PHY_PACKET_SIZE as i64))]
    mpdu_octets: u32,

    /// Request an acknowledgment.
    #[arg(long)]
    ack: bool,

    /// Send to the coordinator, following the incoming superframe.
    #[arg(long)]
    to_coordinator: bool,

    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=14))]
    superframe_order: u8,

    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u8).range(0..=15))]
    final_cap_slot: u8,

    /// Time since the last beacon when the first attempt starts.
    #[arg(long, default_value_t = 0)]
    beacon_offset_us: u32,

    /// CCA outcomes, one `i` (idle) or `b` (busy) per CCA. Idle afterwards.
    #[arg(long, value_parser = parse_channel)]
    channel: Option<ChannelModel>,

    /// Seed of the backoff draws.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of consecutive attempts.
    #[arg(long, default_value_t = 1)]
    attempts: usize,
}

fn main() {
    let args = Args::parse();

    let scenario = Scenario {
        config: CsmaConfig {
            min_be: args.min_be,
            max_be: args.max_be,
            max_backoffs: args.max_backoffs,
            battery_life_extension: args.battery_life_extension,
            mode: if args.slotted {
                CsmaMode::Slotted
            } else {
                CsmaMode::Unslotted
            },
            ..CsmaConfig::default()
        },
        phy: args.phy.into(),
        mpdu_octets: args.mpdu_octets,
        ack_required: args.ack,
        to_coordinator: args.to_coordinator,
        superframe: Superframe::new(Instant::ZERO, args.superframe_order, args.final_cap_slot),
        start: Instant::from_us(args.beacon_offset_us as i64),
        channel: args.channel.unwrap_or(ChannelModel::Idle),
        attempts: args.attempts,
    };

    match Report::run(&scenario, StdRng::seed_from_u64(args.seed)) {
        Ok(report) => print!("{report}"),
        Err(err) => {
            eprintln!("{}: {err}", "error".red().bold());
            std::process::exit(1);
        }
    }
}
