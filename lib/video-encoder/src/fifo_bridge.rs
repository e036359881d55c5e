use crate::{EncoderError, Result};
use crossbeam::channel::{self, Receiver, TryRecvError};
use nix::{
    errno::Errno,
    fcntl::{self, FcntlArg, OFlag},
    sys::stat::Mode,
    unistd::mkfifo,
};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

pub const MANIFEST_NAME: &str = "inputfiles.txt";
const SLOT_NAMES: [&str; 2] = ["slot-a", "slot-b"];

const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(10);
const CONSUMER_GRACE: Duration = Duration::from_secs(1);

/// Stop condition handed to the consumer. It trips when the caller cancels
/// or when the bridge gives up on the window.
pub struct ConsumerStop<'a> {
    cancel_sig: &'a AtomicBool,
    abort_sig: &'a AtomicBool,
}

impl<'a> ConsumerStop<'a> {
    pub fn new(cancel_sig: &'a AtomicBool, abort_sig: &'a AtomicBool) -> Self {
        Self {
            cancel_sig,
            abort_sig,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_sig.load(Ordering::Relaxed) || self.abort_sig.load(Ordering::Relaxed)
    }
}

enum SlotWait {
    Cancelled,
    ConsumerDone(Result<()>),
    Io(std::io::Error),
}

/// Streams frames into an external encoder that wants its whole input list
/// up front.
///
/// The encoder gets a concat manifest naming two named pipes in alternation.
/// Each frame is written into its pipe only when it exists, so the encoder
/// blocks on the pipe until the next capture is ready.
#[derive(Debug)]
pub struct FifoBridge {
    slots: [PathBuf; 2],
    manifest: PathBuf,
}

impl FifoBridge {
    pub fn new(work_dir: impl AsRef<Path>) -> Result<Self> {
        let work_dir = work_dir.as_ref();
        let slots = SLOT_NAMES.map(|name| work_dir.join(name));

        for (i, slot) in slots.iter().enumerate() {
            if let Err(e) = mkfifo(slot, Mode::from_bits_truncate(0o660)) {
                for created in slots[..i].iter() {
                    _ = fs::remove_file(created);
                }

                return Err(EncoderError::PipeSetup(format!(
                    "mkfifo {} failed: {e}",
                    slot.display()
                )));
            }
        }

        Ok(Self {
            slots,
            manifest: work_dir.join(MANIFEST_NAME),
        })
    }

    pub fn slot_for(&self, index: usize) -> &Path {
        &self.slots[index % 2]
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    fn write_manifest(&self, frame_count: usize) -> Result<()> {
        let contents = (0..frame_count)
            .map(|i| format!("file '{}'\n", escape_concat_path(self.slot_for(i))))
            .collect::<String>();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.manifest)
            .map_err(|e| {
                EncoderError::PipeSetup(format!("create {} failed: {e}", self.manifest.display()))
            })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| EncoderError::PipeSetup(format!("write manifest failed: {e}")))?;

        Ok(())
    }

    /// Feed `frame_count` frames from `produce` into `consume`.
    ///
    /// `consume` runs on its own thread and receives the manifest path. Frames
    /// are produced strictly in order, each one only after the consumer has
    /// opened its pipe. The consumer's result is the run's result unless
    /// producing failed. A failed frame always reports the producer's error;
    /// whatever the consumer says about the broken input is only logged.
    pub fn run<E, P, C>(
        &self,
        cancel_sig: &AtomicBool,
        frame_count: usize,
        mut produce: P,
        consume: C,
    ) -> std::result::Result<(), E>
    where
        E: From<EncoderError>,
        P: FnMut(&mut dyn Write, usize) -> std::result::Result<(), E>,
        C: FnOnce(&Path, &ConsumerStop) -> Result<()> + Send,
    {
        if frame_count == 0 {
            return Err(EncoderError::NoFrames.into());
        }

        self.write_manifest(frame_count)?;

        let abort_sig = AtomicBool::new(false);
        let (done_sender, done_receiver) = channel::bounded(1);

        thread::scope(|s| {
            let manifest = self.manifest.as_path();
            let stop = ConsumerStop::new(cancel_sig, &abort_sig);
            let handle = s.spawn(move || {
                _ = done_sender.send(consume(manifest, &stop));
            });

            let result = self.feed(cancel_sig, frame_count, &mut produce, &done_receiver);
            if result.is_err() {
                abort_sig.store(true, Ordering::Relaxed);
            }

            if handle.join().is_err() {
                log::warn!("encoder thread panicked");
            }

            result
        })
    }

    fn feed<E, P>(
        &self,
        cancel_sig: &AtomicBool,
        frame_count: usize,
        produce: &mut P,
        done_receiver: &Receiver<Result<()>>,
    ) -> std::result::Result<(), E>
    where
        E: From<EncoderError>,
        P: FnMut(&mut dyn Write, usize) -> std::result::Result<(), E>,
    {
        for index in 0..frame_count {
            let slot = self.slot_for(index);

            let file = match open_slot(slot, cancel_sig, done_receiver) {
                Ok(file) => file,
                Err(SlotWait::Cancelled) => return Err(EncoderError::Cancelled.into()),
                Err(SlotWait::Io(e)) => return Err(EncoderError::Io(e).into()),
                Err(SlotWait::ConsumerDone(Err(e))) => return Err(e.into()),
                Err(SlotWait::ConsumerDone(Ok(_))) => {
                    return Err(EncoderError::ConsumerExitedEarly {
                        remaining: frame_count - index,
                    }
                    .into());
                }
            };

            if let Err(e) = feed_slot(file, index, produce) {
                log::debug!("producing frame {index} failed, waiting for encoder diagnostics");

                if let Ok(Err(consumer_err)) = done_receiver.recv_timeout(CONSUMER_GRACE) {
                    log::warn!("encoder failed after frame {index} was lost: {consumer_err}");
                }
                return Err(e);
            }

            log::trace!("frame {index} fed into {}", slot.display());
        }

        match done_receiver.recv() {
            Ok(result) => result.map_err(E::from),
            Err(_) => Err(EncoderError::Consumer(
                "encoder thread exited without a result".to_string(),
            )
            .into()),
        }
    }

    fn remove_slots(&self) {
        for slot in self.slots.iter() {
            if let Err(e) = fs::remove_file(slot)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                log::warn!("remove {} failed: {e}", slot.display());
            }
        }
    }
}

impl Drop for FifoBridge {
    fn drop(&mut self) {
        self.remove_slots();
    }
}

/// Open `slot` for writing once a reader is attached.
///
/// A blocking open would hang forever if the consumer died or the run was
/// cancelled, so the open is non-blocking and retried.
fn open_slot(
    slot: &Path,
    cancel_sig: &AtomicBool,
    done_receiver: &Receiver<Result<()>>,
) -> std::result::Result<File, SlotWait> {
    loop {
        match OpenOptions::new()
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(slot)
        {
            Ok(file) => {
                fcntl::fcntl(&file, FcntlArg::F_SETFL(OFlag::empty()))
                    .map_err(|e| SlotWait::Io(e.into()))?;
                return Ok(file);
            }
            Err(e) if e.raw_os_error() == Some(Errno::ENXIO as i32) => (),
            Err(e) => return Err(SlotWait::Io(e)),
        }

        if cancel_sig.load(Ordering::Relaxed) {
            return Err(SlotWait::Cancelled);
        }

        match done_receiver.try_recv() {
            Ok(result) => return Err(SlotWait::ConsumerDone(result)),
            Err(TryRecvError::Disconnected) => {
                return Err(SlotWait::ConsumerDone(Err(EncoderError::Consumer(
                    "encoder thread exited without a result".to_string(),
                ))));
            }
            Err(TryRecvError::Empty) => (),
        }

        thread::sleep(OPEN_RETRY_INTERVAL);
    }
}

fn feed_slot<E, P>(file: File, index: usize, produce: &mut P) -> std::result::Result<(), E>
where
    E: From<EncoderError>,
    P: FnMut(&mut dyn Write, usize) -> std::result::Result<(), E>,
{
    let mut writer = BufWriter::new(file);
    produce(&mut writer, index)?;
    writer.flush().map_err(|e| E::from(EncoderError::Io(e)))?;

    Ok(())
}

/// Quote `path` for a `file '...'` line of an ffmpeg concat list.
pub fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_alternate() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FifoBridge::new(dir.path()).unwrap();

        assert_eq!(bridge.slot_for(0), bridge.slot_for(2));
        assert_eq!(bridge.slot_for(1), bridge.slot_for(3));
        assert_ne!(bridge.slot_for(0), bridge.slot_for(1));
        assert_eq!(bridge.slot_for(0), dir.path().join("slot-a"));
        assert_eq!(bridge.slot_for(1), dir.path().join("slot-b"));
    }

    #[test]
    fn test_slots_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FifoBridge::new(dir.path()).unwrap();
        let slot = bridge.slot_for(0).to_path_buf();
        assert!(slot.exists());

        drop(bridge);
        assert!(!slot.exists());
    }

    #[test]
    fn test_new_fails_when_slots_exist() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FifoBridge::new(dir.path()).unwrap();

        assert!(matches!(
            FifoBridge::new(dir.path()),
            Err(EncoderError::PipeSetup(_))
        ));
        assert!(bridge.slot_for(0).exists());
        assert!(bridge.slot_for(1).exists());
    }

    #[test]
    fn test_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FifoBridge::new(dir.path()).unwrap();
        bridge.write_manifest(3).unwrap();

        let a = dir.path().join("slot-a");
        let b = dir.path().join("slot-b");
        let expected = format!(
            "file '{0}'\nfile '{1}'\nfile '{0}'\n",
            a.display(),
            b.display()
        );
        assert_eq!(fs::read_to_string(bridge.manifest_path()).unwrap(), expected);
    }

    #[test]
    fn test_escape_concat_path() {
        assert_eq!(escape_concat_path(Path::new("/tmp/a b")), "/tmp/a b");
        assert_eq!(
            escape_concat_path(Path::new("/tmp/it's")),
            r"/tmp/it'\''s"
        );
    }

    #[test]
    fn test_no_frames_launches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FifoBridge::new(dir.path()).unwrap();
        let cancel_sig = AtomicBool::new(false);
        let launched = AtomicBool::new(false);

        let result: Result<()> = bridge.run(
            &cancel_sig,
            0,
            |_, _| Ok(()),
            |_, _| {
                launched.store(true, Ordering::Relaxed);
                Ok(())
            },
        );

        assert!(matches!(result, Err(EncoderError::NoFrames)));
        assert!(!launched.load(Ordering::Relaxed));
        assert!(!bridge.manifest_path().exists());
    }

    #[test]
    fn test_consumer_stop() {
        let cancel_sig = AtomicBool::new(false);
        let abort_sig = AtomicBool::new(false);
        let stop = ConsumerStop::new(&cancel_sig, &abort_sig);
        assert!(!stop.is_stopped());

        abort_sig.store(true, Ordering::Relaxed);
        assert!(stop.is_stopped());

        abort_sig.store(false, Ordering::Relaxed);
        cancel_sig.store(true, Ordering::Relaxed);
        assert!(stop.is_stopped());
    }
}
