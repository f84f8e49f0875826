use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use keel_sim::delegate::RepairPlan;
use keel_sim::platform::{BacktraceFrame, HaltMode, SprFile};
use keel_sim::{parse_symbol, parse_u64, RunResult, SimConfig, Simulator, TrapScenario};
use keel_trap::Msr;
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    core: CoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CoreArgs {
    /// Processor id of the trapping core
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    pir: u32,

    /// Symbol for diagnostics, as name@address (repeatable)
    #[arg(long = "symbol", value_parser = parse_symbol)]
    symbols: Vec<(u64, String)>,

    /// Backtrace frame, as sp:return (repeatable)
    #[arg(long = "frame", value_parser = BacktraceFrame::parse)]
    frames: Vec<BacktraceFrame>,

    /// Also send diagnostics to the log at error level
    #[arg(long)]
    log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one trap through the exception entry
    Dispatch {
        /// Trap vector, e.g. 0x300
        #[arg(long, value_parser = parse_u64)]
        vector: u64,

        /// Address of the interrupted instruction
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        nip: u64,

        /// Machine state at the trap (defaults to RI set)
        #[arg(long, value_parser = parse_u64)]
        msr: Option<u64>,

        /// Faulting data address
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        dar: u64,

        /// The faulting access was a store
        #[arg(long)]
        store: bool,

        /// Translation is set up on this core (also sets IR/DR in the default MSR)
        #[arg(long)]
        vm: bool,

        /// A non-linear local map is in use
        #[arg(long)]
        local_map: bool,

        /// Fault delegates report a successful repair
        #[arg(long)]
        repair: bool,
    },
    /// System reset taken while the core was asleep
    SleepReset,
    /// Machine check taken while the core was asleep
    SleepMce {
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        srr0: u64,
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        srr1: u64,
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        dsisr: u64,
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        dar: u64,
    },
    /// Call the deprecated exception handler registration
    RegisterHandler {
        #[arg(value_parser = parse_u64, num_args = 0..)]
        args: Vec<u64>,
    },
}

fn parse_u32(s: &str) -> Result<u32> {
    Ok(u32::try_from(parse_u64(s)?)?)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("keel trap replay on core {:#x}", cli.core.pir);
    let mut config = SimConfig {
        pir: cli.core.pir,
        symbols: cli.core.symbols,
        backtrace: cli.core.frames,
        halt_mode: HaltMode::Exit(1),
        echo: true,
        log_lines: cli.core.log,
        ..Default::default()
    };

    match cli.command {
        Commands::Dispatch {
            vector,
            nip,
            msr,
            dar,
            store,
            vm,
            local_map,
            repair,
        } => {
            let default_msr = if vm {
                Msr::RI | Msr::TRANSLATION
            } else {
                Msr::RI
            };
            config.vm_setup = vm;
            config.vm_local_map_inuse = local_map;
            if repair {
                config.repair = RepairPlan::all();
            }
            let mut sim = Simulator::new(config);
            let mut ctx = TrapScenario {
                vector,
                nip,
                msr: msr.unwrap_or(default_msr.bits()),
                dar,
                store,
                ..Default::default()
            }
            .context();

            println!("Dispatching trap {:#x} at {:#x}...", vector, nip);
            report(sim.dispatch(&mut ctx));
            println!("SRR0={:#018x} SRR1={:#018x} vm_setup={}", ctx.srr0, ctx.srr1, sim.core.vm_setup);
        }
        Commands::SleepReset => {
            let mut sim = Simulator::new(config);
            sim.sleep_reset();
            println!("Returning to wakeup path.");
        }
        Commands::SleepMce {
            srr0,
            srr1,
            dsisr,
            dar,
        } => {
            config.sprs = SprFile {
                srr0,
                srr1,
                dsisr,
                dar,
            };
            let mut sim = Simulator::new(config);
            report(sim.sleep_machine_check());
        }
        Commands::RegisterHandler { args } => {
            let mut sim = Simulator::new(config);
            println!("rc = {}", sim.register_exception_handler(&args));
        }
    }

    Ok(())
}

fn report(result: RunResult) {
    // Only reachable with HaltMode::Unwind; Exit stops the process in halt.
    match result {
        RunResult::Resumed(outcome) => println!("Trap handled: {:?}", outcome),
        RunResult::Halted => println!("System halted."),
    }
}
