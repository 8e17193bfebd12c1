//! Terminal report for a finished session

use colored::*;

use crate::kernels::Kernel;
use crate::session::BenchmarkResult;
use crate::thermal::ThermalState;

const WIDTH: usize = 62;

fn format_line(label: &str, content: &str) -> String {
    let content_width = WIDTH.saturating_sub(1);
    let label_len = label.chars().count();
    let room = content_width.saturating_sub(label_len);
    let content: String = content.chars().take(room).collect();
    format!("║ {label}{content:<room$}║\n")
}

fn rule(left: char, right: char) -> String {
    format!("{left}{}{right}\n", "═".repeat(WIDTH))
}

/// Boxed plain-text summary of `result`.
pub fn render(result: &BenchmarkResult) -> String {
    let mut output = String::new();

    output.push_str(&rule('╔', '╗'));
    output.push_str(&format!("║{:^WIDTH$}║\n", "BENCHMARK RESULTS"));
    output.push_str(&rule('╠', '╣'));

    if let Some(device) = &result.device {
        output.push_str(&format_line("Device:  ", &device.summary()));
        if let Some(max) = device.max_frequency_mhz {
            output.push_str(&format_line("         ", &format!("Max Clock: {max} MHz")));
        }
        output.push_str(&format_line(
            "         ",
            &format!("RAM: {:.1} GB", device.total_memory_mb as f64 / 1024.0),
        ));
        output.push_str(&rule('╠', '╣'));
    }

    let status = if result.success { "OK" } else { "FAILED" };
    output.push_str(&format_line("Status:  ", status));
    output.push_str(&format_line("         ", &result.message));
    let thermal = match result.thermal_state {
        ThermalState::Cool => "cool",
        ThermalState::ThrottleRisk => "throttle risk",
    };
    output.push_str(&format_line("Thermal: ", thermal));
    if let Some(peak) = result.peak_celsius() {
        output.push_str(&format_line("         ", &format!("Peak: {peak:.1}°C")));
    }

    output.push_str(&rule('╠', '╣'));
    output.push_str(&format_line(
        "Single-core: ",
        &format!("{:.0}", result.single_core),
    ));
    output.push_str(&format_line(
        "Multi-core:  ",
        &format!("{:.0} ({} threads)", result.multi_core, result.threads),
    ));
    for kernel in Kernel::ALL {
        if let Some(ms) = result.kernel_timings.get(kernel) {
            output.push_str(&format_line(
                "    ",
                &format!("{:<22}{ms:>10.1} ms", kernel.label()),
            ));
        }
    }
    if result.lu_failures > 0 {
        output.push_str(&format_line(
            "    ",
            &format!("Singular LU iterations: {}", result.lu_failures),
        ));
    }

    output.push_str(&rule('╠', '╣'));
    output.push_str(&format_line("Memory:      ", &format!("{:.0}", result.ram_score)));
    output.push_str(&format_line(
        "    ",
        &format!(
            "L1 {:.1} GB/s   L2 {:.1} GB/s   RAM {:.1} GB/s",
            result.l1_gbs, result.l2_gbs, result.ram_gbs
        ),
    ));

    if let Some(render_score) = result.render_score {
        output.push_str(&format_line("Rendering:   ", &format!("{render_score:.0}")));
    }

    output.push_str(&rule('╠', '╣'));
    output.push_str(&format_line(
        "Duration: ",
        &format!("{:.1}s", result.duration_secs),
    ));
    output.push_str(&format_line("Run ID:   ", &result.id.to_string()));
    output.push_str(&rule('╚', '╝'));

    output
}

/// Print the report, colored by outcome.
pub fn print(result: &BenchmarkResult) {
    let text = render(result);
    if result.success {
        println!("\n{}", text.bright_cyan());
    } else {
        println!("\n{}", text.bright_red());
    }
    if result.thermal_state == ThermalState::ThrottleRisk && result.success {
        println!(
            "{}",
            "Device was warm at start; compare this run with care.".bright_yellow()
        );
    }
}
