use crate::{OutputRecorder, RecorderConfig, RecorderError};
use crossbeam::channel;
use screen_capture::{OutputRegion, ScreenCapture};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};
use video_encoder::SegmentEncoder;

/// Runs one recorder thread per output and stops all of them on the first failure.
pub struct RecorderSupervisor {
    cancel_sig: Arc<AtomicBool>,
}

impl RecorderSupervisor {
    pub fn new(cancel_sig: Arc<AtomicBool>) -> Self {
        Self { cancel_sig }
    }

    /// Shared flag for signal handlers. Setting it stops every recorder.
    pub fn cancel_sig(&self) -> Arc<AtomicBool> {
        self.cancel_sig.clone()
    }

    pub fn stop(&self) {
        self.cancel_sig.store(true, Ordering::Relaxed);
    }

    /// Run `tasks` on named threads until all of them return.
    ///
    /// The first real error cancels the others and is returned once they are
    /// done. Errors that only report the cancellation are logged and dropped.
    pub fn run<I, F>(&self, tasks: I) -> Result<(), RecorderError>
    where
        I: IntoIterator<Item = (String, F)>,
        F: FnOnce(&AtomicBool) -> Result<(), RecorderError> + Send,
    {
        let tasks = tasks.into_iter().collect::<Vec<_>>();
        if tasks.is_empty() {
            return Err(RecorderError::NoOutputs);
        }

        let (sender, receiver) = channel::unbounded();
        let cancel_sig = self.cancel_sig.as_ref();

        thread::scope(|s| {
            let mut first_error = None;

            for (name, task) in tasks {
                let sender = sender.clone();
                let spawned = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(s, move || {
                        let result = task(cancel_sig);
                        _ = sender.send((name, result));
                    });

                if let Err(e) = spawned {
                    log::warn!("spawn recorder thread failed: {e}");
                    self.stop();
                    first_error = Some(RecorderError::Setup(format!(
                        "spawn recorder thread failed: {e}"
                    )));
                    break;
                }
            }
            drop(sender);

            for (name, result) in receiver.iter() {
                match result {
                    Ok(()) => log::info!("[{name}] recorder finished"),
                    Err(e) if e.is_cancellation() && cancel_sig.load(Ordering::Relaxed) => {
                        log::debug!("[{name}] recorder cancelled: {e}")
                    }
                    Err(e) if first_error.is_none() => {
                        log::warn!("[{name}] recorder failed, stopping all outputs: {e}");
                        self.stop();
                        first_error = Some(e);
                    }
                    Err(e) => log::warn!("[{name}] recorder failed: {e}"),
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    /// Record every output in `outputs` with its own capturer and encoder copy.
    pub fn record_outputs<C, E>(
        &self,
        outputs: Vec<OutputRegion>,
        config: &RecorderConfig,
        capturer: C,
        encoder: E,
    ) -> Result<(), RecorderError>
    where
        C: ScreenCapture + Clone + Send,
        E: SegmentEncoder + Clone + Send + Sync,
    {
        config.validate()?;

        let tasks = outputs.into_iter().map(|output| {
            let name = output.name.clone();
            let mut recorder =
                OutputRecorder::new(output, config.clone(), capturer.clone(), encoder.clone());
            (name, move |cancel_sig: &AtomicBool| recorder.run(cancel_sig))
        });

        self.run(tasks)
    }
}

/// Connected outputs of `capturer`, limited to the names in `only` unless it is empty.
pub fn discover_outputs<C: ScreenCapture>(
    capturer: &mut C,
    only: &[String],
) -> Result<Vec<OutputRegion>, RecorderError> {
    let outputs = capturer.available_outputs()?;

    for name in only {
        if !outputs.iter().any(|output| &output.name == name) {
            log::warn!("output {name} is not connected");
        }
    }

    let outputs = outputs
        .into_iter()
        .filter(|output| only.is_empty() || only.contains(&output.name))
        .collect::<Vec<_>>();

    if outputs.is_empty() {
        return Err(RecorderError::NoOutputs);
    }

    for output in &outputs {
        log::info!("found output {} at {}", output.name, output.region);
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use screen_capture::{RawFramebufferReply, Rectangle, ScreenCaptureError, ScreenInfoError};
    use std::time::Duration;

    struct Outputs(Result<Vec<OutputRegion>, String>);

    impl ScreenCapture for Outputs {
        fn available_outputs(&mut self) -> Result<Vec<OutputRegion>, ScreenInfoError> {
            self.0.clone().map_err(ScreenInfoError::Command)
        }

        fn capture_region(
            &mut self,
            _region: &Rectangle,
        ) -> Result<RawFramebufferReply, ScreenCaptureError> {
            Err(ScreenCaptureError::Unsupported("outputs only".to_string()))
        }
    }

    fn two_outputs() -> Outputs {
        Outputs(Ok(vec![
            OutputRegion::new("eDP-1", Rectangle::new(0, 0, 1920, 1080)),
            OutputRegion::new("HDMI-1", Rectangle::new(1920, 0, 2560, 1440)),
        ]))
    }

    type Task = Box<dyn FnOnce(&AtomicBool) -> Result<(), RecorderError> + Send>;

    fn task(f: impl FnOnce(&AtomicBool) -> Result<(), RecorderError> + Send + 'static) -> Task {
        Box::new(f)
    }

    fn wait_for_cancel(cancel_sig: &AtomicBool) -> Result<(), RecorderError> {
        while !cancel_sig.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(10));
        }
        Err(RecorderError::Cancelled)
    }

    #[test]
    fn test_discover_all_outputs() {
        assert_eq!(discover_outputs(&mut two_outputs(), &[]).unwrap().len(), 2);
    }

    #[test]
    fn test_discover_named_outputs() {
        let outputs = discover_outputs(&mut two_outputs(), &["HDMI-1".to_string()]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "HDMI-1");
    }

    #[test]
    fn test_discover_no_outputs() {
        assert!(matches!(
            discover_outputs(&mut two_outputs(), &["DP-3".to_string()]),
            Err(RecorderError::NoOutputs)
        ));
        assert!(matches!(
            discover_outputs(&mut Outputs(Ok(vec![])), &[]),
            Err(RecorderError::NoOutputs)
        ));
    }

    #[test]
    fn test_discover_outputs_command_failure() {
        let mut capturer = Outputs(Err("Can't open display".to_string()));
        assert!(matches!(
            discover_outputs(&mut capturer, &[]),
            Err(RecorderError::ScreenInfo(ScreenInfoError::Command(_)))
        ));
    }

    #[test]
    fn test_no_tasks() {
        let supervisor = RecorderSupervisor::new(Arc::new(AtomicBool::new(false)));
        let tasks: Vec<(String, Task)> = vec![];
        assert!(matches!(supervisor.run(tasks), Err(RecorderError::NoOutputs)));
    }

    #[test]
    fn test_all_tasks_finish() {
        let supervisor = RecorderSupervisor::new(Arc::new(AtomicBool::new(false)));
        let tasks: Vec<(String, Task)> = vec![
            ("DP-1".to_string(), task(|_| Ok(()))),
            ("DP-2".to_string(), task(|_| Ok(()))),
        ];

        assert!(supervisor.run(tasks).is_ok());
        assert!(!supervisor.cancel_sig().load(Ordering::Relaxed));
    }

    #[test]
    fn test_first_failure_cancels_others() {
        let supervisor = RecorderSupervisor::new(Arc::new(AtomicBool::new(false)));
        let tasks: Vec<(String, Task)> = vec![
            ("DP-1".to_string(), task(wait_for_cancel)),
            (
                "DP-2".to_string(),
                task(|_| Err(RecorderError::Finalize("disk full".to_string()))),
            ),
            ("HDMI-1".to_string(), task(wait_for_cancel)),
        ];

        match supervisor.run(tasks) {
            Err(RecorderError::Finalize(msg)) => assert_eq!(msg, "disk full"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(supervisor.cancel_sig().load(Ordering::Relaxed));
    }

    #[test]
    fn test_external_stop() {
        let supervisor = RecorderSupervisor::new(Arc::new(AtomicBool::new(false)));
        let cancel_sig = supervisor.cancel_sig();
        let tasks: Vec<(String, Task)> = vec![
            ("DP-1".to_string(), task(wait_for_cancel)),
            ("DP-2".to_string(), task(wait_for_cancel)),
        ];

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel_sig.store(true, Ordering::Relaxed);
        });

        assert!(supervisor.run(tasks).is_ok());
        stopper.join().unwrap();
    }
}
