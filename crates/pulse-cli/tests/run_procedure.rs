use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, f64::consts::PI, fs, path::Path};
use tempfile::tempdir;

const FS: f64 = 250.0;

/// Gaussian R waves every `period` seconds from 0.5 s on, over a slow sine baseline.
fn write_ecg(path: &Path, beats: usize, period: f64) -> std::io::Result<()> {
    let duration = 0.5 + beats as f64 * period;
    let n = (duration * FS) as usize;
    let mut text = String::from("# synthetic ECG, 250 Hz\n");
    for i in 0..n {
        let t = i as f64 / FS;
        let mut v = 0.05 * (2.0 * PI * t).sin();
        for k in 0..beats {
            let bt = 0.5 + k as f64 * period;
            v += 1.2 * (-0.5 * ((t - bt) / 0.02).powi(2)).exp();
        }
        text.push_str(&format!("{v}\n"));
    }
    fs::write(path, text)
}

fn stdout_json(output: &std::process::Output) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn list_reports_builtins() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("pulse").arg("list").assert().success().get_output().clone();
    let json = stdout_json(&output)?;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    for expected in ["highpass", "lowpass", "smooth", "r_peaks", "sbp", "dbp", "heart_rate", "rmssd", "mean_pressure"] {
        assert!(names.contains(&expected), "{expected} missing from {names:?}");
    }
    let r_peaks = json
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "r_peaks")
        .unwrap();
    assert_eq!(r_peaks["kind"], "Detect");
    assert_eq!(r_peaks["output_kind"], "R");
    assert_eq!(r_peaks["arguments"]["stall_factor"]["default"], "1.7");

    let output = cargo_bin_cmd!("pulse")
        .args(["list", "--kind", "parameterize"])
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output)?.as_array().unwrap().len(), 3);
    Ok(())
}

#[test]
fn r_peaks_then_heart_rate() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let ecg = temp.path().join("ecg.txt");
    write_ecg(&ecg, 10, 0.8)?;

    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "r_peaks", "--fs", "250"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output)?;
    let points = &json["Points"];
    assert_eq!(points["kind"], "R");
    let times: Vec<f64> = points["times"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_f64().unwrap())
        .collect();
    assert_eq!(times.len(), 10);
    for (k, t) in times.iter().enumerate() {
        let expected = 0.5 + k as f64 * 0.8;
        assert!((t - expected).abs() <= 1.0 / FS + 1e-9, "beat {k}: {t}");
    }

    let beats = temp.path().join("r.txt");
    let rows: String = times.iter().map(|t| format!("{t} 1.0\n")).collect();
    fs::write(&beats, rows)?;
    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "heart_rate", "--begin", "0", "--end", "8", "--window-s", "4"])
        .arg("--points")
        .arg(format!("R={}", beats.display()))
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output)?;
    let values = json["Parameter"]["values"].as_array().unwrap();
    assert_eq!(values.len(), 2);
    for v in values {
        assert!((v.as_f64().unwrap() - 75.0).abs() < 0.5);
    }
    Ok(())
}

#[test]
fn missing_input_is_reported() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let ecg = temp.path().join("ecg.txt");
    write_ecg(&ecg, 3, 0.8)?;
    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "sbp"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing inputs"), "{stderr}");
    assert!(stderr.contains("BP"), "{stderr}");
    Ok(())
}

#[test]
fn args_file_and_overrides_are_validated() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let ecg = temp.path().join("ecg.txt");
    write_ecg(&ecg, 4, 0.8)?;
    let args = temp.path().join("args.toml");
    fs::write(&args, "threshold_fraction = 1.5\nmax_widenings = 2\n")?;

    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "r_peaks"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .arg("--args-file")
        .arg(&args)
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("threshold_fraction"), "{stderr}");

    // A command-line value wins over the file.
    cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "r_peaks", "--arg", "threshold_fraction=0.4"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .arg("--args-file")
        .arg(&args)
        .assert()
        .success();
    Ok(())
}

#[test]
fn lowpass_rejects_cutoff_above_nyquist() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let ecg = temp.path().join("ecg.txt");
    write_ecg(&ecg, 2, 0.8)?;
    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "lowpass", "--target", "ECG", "--arg", "cutoff_hz=200"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nyquist"));

    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "lowpass", "--target", "ECG", "--arg", "cutoff_hz=40"])
        .args(["--begin", "0.5", "--end", "1.5"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output)?;
    assert_eq!(json["Wave"]["data"].as_array().unwrap().len(), 250);
    assert!((json["Wave"]["offset"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn plot_describes_every_series() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let ecg = temp.path().join("ecg.txt");
    write_ecg(&ecg, 2, 0.8)?;
    let beats = temp.path().join("r.txt");
    fs::write(&beats, "0.5,1.2\n1.3,1.2\n")?;
    let output = cargo_bin_cmd!("pulse")
        .args(["plot", "--max-points", "100"])
        .arg("--wave")
        .arg(format!("ECG={}", ecg.display()))
        .arg("--points")
        .arg(format!("R={}", beats.display()))
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output)?;
    let series = json["series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["Line"]["points"].as_array().unwrap().len(), 100);
    assert_eq!(series[1]["Scatter"]["points"].as_array().unwrap().len(), 2);
    Ok(())
}

#[test]
fn unbounded_range_cannot_be_tiled() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let beats = temp.path().join("r.txt");
    fs::write(&beats, "0.0 1.0\n1.0 1.0\n2.0 1.0\n")?;
    let output = cargo_bin_cmd!("pulse")
        .args(["run", "--procedure", "heart_rate", "--begin=-inf", "--end", "3", "--window-s", "1"])
        .arg("--points")
        .arg(format!("R={}", beats.display()))
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("window_s"), "{stderr}");
    Ok(())
}
